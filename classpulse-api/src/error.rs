//! HTTP error mapping for classpulse-api
//!
//! Handler-facing error type carrying the response status. Zero-event
//! aggregate reads are deliberately NOT represented here: an empty session
//! returns the zero aggregate, not an error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use classpulse_common::Error;

/// Error type produced by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// A batch record failed validation; nothing was persisted
    #[error("Invalid record at index {index}: {reason}")]
    Validation { index: usize, reason: String },

    /// Malformed request outside of per-record validation
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid API key
    #[error("Invalid API key")]
    Auth,

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying storage temporarily unavailable; caller may retry
    #[error("Storage unavailable: {0}")]
    Store(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { index, reason } => ApiError::Validation { index, reason },
            Error::Database(e) => ApiError::Store(e.to_string()),
            Error::Io(e) => ApiError::Store(e.to_string()),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Config(msg) => ApiError::Internal(msg),
            Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Store(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation { index, reason } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("Invalid record at index {}: {}", index, reason),
                    "index": index,
                }),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Auth => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid API key" }),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Store(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": format!("Storage unavailable: {}", msg),
                    "retryable": true,
                }),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}
