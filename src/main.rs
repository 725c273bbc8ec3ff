use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cmdb_api::config;
use cmdb_api::database::{DatabaseManager, PgExecutor};
use cmdb_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, TRUST_MODE, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    tracing::info!(
        "Starting CMDB API in {:?} mode (trust mode {:?})",
        config.environment,
        config.trust_mode
    );

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to create database pool")?;
    let executor = PgExecutor::new(pool.clone(), config.database.enable_query_logging);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::new(config, Arc::new(executor));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("CMDB API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close(&pool).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
