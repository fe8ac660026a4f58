mod common;
mod config;
mod external;
mod orders;
mod routes;

use crate::common::state::AppState;
use crate::config::Config;
use crate::external::workflow::HttpWorkflowClient;
use axum_keycloak_auth::{Url, instance::KeycloakAuthInstance, instance::KeycloakConfig};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration and environment variables to pass to the application
    let config: Config = Config::from_env();

    let db_url = config
        .db_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("DB_URL is not set"))?;
    let db: DatabaseConnection = Database::connect(&db_url).await?;

    if db.ping().await.is_ok() {
        tracing::info!("Connected to the database");
    } else {
        tracing::warn!("Could not connect to the database");
    }

    Migrator::up(&db, None).await?;
    tracing::info!("DB migrations complete");

    let keycloak_instance: Option<Arc<KeycloakAuthInstance>> = if config.keycloak_url.is_empty() {
        None
    } else {
        Some(Arc::new(KeycloakAuthInstance::new(
            KeycloakConfig::builder()
                .server(Url::parse(&config.keycloak_url)?)
                .realm(String::from(&config.keycloak_realm))
                .build(),
        )))
    };

    let workflow = Arc::new(HttpWorkflowClient::new(&config)?);
    let state = AppState::new(db, config.clone(), keycloak_instance, workflow);

    tracing::info!(
        "Starting server {} ({} deployment) ...",
        config.app_name,
        config.deployment.to_uppercase()
    );

    let addr: std::net::SocketAddr = "0.0.0.0:3000".parse()?;
    tracing::info!("Listening on {addr}");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        routes::build_router(&state).into_make_service(),
    )
    .await?;

    Ok(())
}
