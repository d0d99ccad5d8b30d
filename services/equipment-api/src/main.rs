mod app;
mod config;
mod owner;
mod pg_store;
mod report;
mod routes_datasets;
mod routes_report;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::AppConfig;
use crate::pg_store::PgDatasetStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    // --- Postgres ---
    let pg_pool = PgPool::connect(&cfg.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run migrations")?;

    check_postgres(&pg_pool).await?;
    info!("postgres: ok");

    info!(
        keep = cfg.retention_keep,
        history_limit = cfg.history_limit,
        fetch_policy = ?cfg.fetch_policy,
        "equipment service configured"
    );

    let store = Arc::new(PgDatasetStore::new(pg_pool));
    let app_state = Arc::new(AppState::new(store, cfg.clone()));
    let app = app::build_router(app_state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("equipment-api listening on http://{addr}");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn check_postgres(pg_pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pg_pool)
        .await
        .context("Postgres ping failed")?;
    Ok(())
}
