//! Recent activity feed
//!
//! Read-only view of the tail of the event store, for the dashboard's
//! recent-activity panel.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use classpulse_common::signal::SignalRecord;

use crate::db::signals;
use crate::error::ApiError;
use crate::AppState;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Restrict to one session; all sessions of the class when absent
    pub session: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /signals/{class_id}/recent
///
/// The last `limit` ingested events for the class (default 10, max 100),
/// newest first, as wire records.
pub async fn recent_signals(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<SignalRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let events = signals::recent(&state.db, &class_id, query.session, limit).await?;
    Ok(Json(events.iter().map(SignalRecord::from).collect()))
}
