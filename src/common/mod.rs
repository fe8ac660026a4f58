pub mod auth;
pub mod errors;
pub mod models;
pub mod sales_token;
pub mod state;
pub mod views;
