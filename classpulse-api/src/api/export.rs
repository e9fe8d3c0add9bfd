//! CSV export endpoint

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::db::signals;
use crate::error::ApiError;
use crate::export::to_csv;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Restrict the export to one session; all sessions when absent
    pub session: Option<i64>,
}

/// GET /export/{class_id}/csv
///
/// Stateless re-derivation from the event store; can be repeated at any
/// time with identical results for an unchanged session.
pub async fn export_csv(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let events = match query.session {
        Some(session_number) => {
            signals::fetch_session(&state.db, &class_id, session_number).await?
        }
        None => signals::fetch_class(&state.db, &class_id).await?,
    };
    let body = to_csv(&events)?;

    let filename = format!("session_{}_{}.csv", class_id, Utc::now().format("%Y-%m-%d"));
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, body).into_response())
}
