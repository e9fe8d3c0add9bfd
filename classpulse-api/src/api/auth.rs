//! API key authentication middleware
//!
//! A single static shared secret in the X-API-Key header guards the
//! data-bearing routes. There are no per-user accounts: students stay
//! anonymous and only the teacher-facing consumer holds the key. This is a
//! deliberate simplification, documented as unsuitable for sensitive
//! deployments without upgrade.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Reject requests that don't carry the shared secret
///
/// Applied to protected routes only. /health stays open for monitors and
/// /events stays open because the browser EventSource API cannot set
/// request headers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == state.api_key => Ok(next.run(request).await),
        _ => Err(ApiError::Auth),
    }
}
