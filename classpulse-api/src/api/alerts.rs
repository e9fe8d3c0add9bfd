//! Live advisory read and dismissal endpoints

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use classpulse_common::alerts::TipAlert;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    /// Current advisory, or null when the session is Idle
    pub alert: Option<TipAlert>,
}

#[derive(Debug, Serialize)]
pub struct DismissResponse {
    pub status: String,
    /// Whether an advisory was actually standing
    pub dismissed: bool,
}

/// GET /alerts/{class_id}/{session_number}
pub async fn current_alert(
    State(state): State<AppState>,
    Path((class_id, session_number)): Path<(String, i64)>,
) -> Json<AlertResponse> {
    let alert = state.alert_engine.current(&class_id, session_number).await;
    Json(AlertResponse { alert })
}

/// POST /alerts/{class_id}/{session_number}/dismiss
pub async fn dismiss_alert(
    State(state): State<AppState>,
    Path((class_id, session_number)): Path<(String, i64)>,
) -> Json<DismissResponse> {
    let dismissed = state.alert_engine.dismiss(&class_id, session_number).await;
    Json(DismissResponse {
        status: "ok".to_string(),
        dismissed,
    })
}
