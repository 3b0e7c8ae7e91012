//! Storyloom API server library.
//!
//! Exposes the router and its state so the binary and the integration tests
//! assemble the same application.

pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let sessions = routes::sessions::router()
        .merge(routes::posting::router())
        .merge(routes::events::router());

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", sessions)
        .nest("/api/v1/characters", routes::characters::router())
        .nest("/api/v1/players", routes::players::router())
        .nest("/api/v1/channels", routes::channels::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
