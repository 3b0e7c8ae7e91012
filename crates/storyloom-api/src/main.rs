//! Storyloom API server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use storyloom_api::config::AppConfig;
use storyloom_api::error::AppError;
use storyloom_api::state::{AppState, Repositories};
use storyloom_api::{app, telemetry};
use storyloom_core::clock::SystemClock;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Storyloom API server");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let state = AppState::new(
        Arc::new(SystemClock),
        Repositories::postgres(&pool),
        config.waits,
        config.default_turn_duration,
    );
    let loaded = state.registry.load_all(state.sessions.as_ref()).await?;
    tracing::info!(sessions = loaded, "live sessions restored");

    let addr = config.listen_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
