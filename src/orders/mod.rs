pub mod access;
pub mod comparisons;
pub mod fields;
pub mod models;
pub mod status;
pub mod sync;
pub mod update;
pub mod validation;
pub mod views;

pub mod sample_items {
    pub mod models;
}
pub mod pairwise {
    pub mod models;
}
pub mod multi_group {
    pub mod models;
}
