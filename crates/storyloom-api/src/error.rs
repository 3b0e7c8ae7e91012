//! Error types for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use storyloom_core::error::DomainError;
use storyloom_core::ids::MessageRef;
use thiserror::Error;
use tracing::error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Persisted state could not be loaded.
    #[error("startup error: {0}")]
    Startup(#[from] DomainError),

    /// Tracing exporter could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    pub message: String,
    /// Messages left in the channel by a post that could not be recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_refs: Option<Vec<MessageRef>>,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            DomainError::InvalidTurnOrder(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_turn_order")
            }
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::AttachmentFetchFailed(_) => {
                (StatusCode::BAD_GATEWAY, "attachment_fetch_failed")
            }
            DomainError::IdentityResolutionFailed { .. } => {
                (StatusCode::CONFLICT, "identity_resolution_failed")
            }
            DomainError::Messaging(_) => (StatusCode::BAD_GATEWAY, "messaging_error"),
            DomainError::PublishedButNotRecorded { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "published_but_not_recorded")
            }
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        if status.is_server_error() {
            error!(error = %self.0, code = error_code, "request failed");
        }

        let message_refs = match &self.0 {
            DomainError::PublishedButNotRecorded { message_refs, .. } => Some(message_refs.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
            message_refs,
        };

        (status, Json(body)).into_response()
    }
}
