mod config;
mod db;
mod domain;
mod error;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::db::{seed, MemoryStore, PgStore, Store};
use crate::state::{AppState, SharedState};
use crate::web::auth::SharedSecret;
use anyhow::anyhow;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    if config.ephemeral_session_key {
        tracing::warn!("SESSION_KEY not set; using a random key, sessions will not survive a restart");
    }

    let store = connect_store(&config).await?;
    if config.seed_demo_data {
        seed::seed_all(store.as_ref()).await?;
    }

    let password = SharedSecret::new(&config.shared_password)
        .map_err(|e| anyhow!("Failed to hash shared password: {}", e))?;
    let shared: SharedState = Arc::new(AppState::new(&config, store, password));
    if !shared.ai.is_enabled() {
        tracing::info!("OPENAI_API_KEY not set; AI endpoints will return 502");
    }

    let app = Router::new()
        .merge(web::routes(shared))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise the in-memory demo store.
async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; running on the in-memory demo store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    Ok(Arc::new(PgStore::new(pool)))
}
