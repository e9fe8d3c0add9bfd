//! Session analytics read endpoints
//!
//! Aggregates are recomputed from the event store on every read; no cached
//! aggregate is authoritative. A session with zero events returns the zero
//! aggregate, not an error.

use axum::extract::{Path, State};
use axum::Json;

use classpulse_common::analytics::{aggregate, compare, ComparisonResult, SessionAggregate};

use crate::db::signals;
use crate::error::ApiError;
use crate::AppState;

/// GET /analytics/{class_id}/{session_number}
pub async fn session_analytics(
    State(state): State<AppState>,
    Path((class_id, session_number)): Path<(String, i64)>,
) -> Result<Json<SessionAggregate>, ApiError> {
    let events = signals::fetch_session(&state.db, &class_id, session_number).await?;
    Ok(Json(aggregate(&class_id, session_number, &events)))
}

/// GET /analytics/{class_id}/compare
///
/// Fixed two-session model: session 2 against session 1.
pub async fn session_comparison(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let first = signals::fetch_session(&state.db, &class_id, 1).await?;
    let second = signals::fetch_session(&state.db, &class_id, 2).await?;
    let result = compare(
        &aggregate(&class_id, 1, &first),
        &aggregate(&class_id, 2, &second),
    );
    Ok(Json(result))
}
