//! Batch signal ingestion
//!
//! One POST carries a non-empty ordered sequence of wire records: a whole
//! reflection-mode submission, or a singleton batch for one live tap. The
//! batch validates and persists atomically; afterwards the new events fan
//! out to the class hub and the alerting engine. Fan-out failures never
//! affect the ingest result: the client's acknowledgement depends only on
//! the append.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use classpulse_common::analytics::aggregate;
use classpulse_common::events::ClassEvent;
use classpulse_common::signal::{validate_batch, SignalRecord};

use crate::db::signals;
use crate::error::ApiError;
use crate::AppState;

/// Acknowledgement returned for an accepted batch
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    /// Number of events appended to the store
    pub accepted: usize,
}

/// POST /ingest
///
/// Duplicate submissions (client retries) create duplicate events: with no
/// stable event identity there is nothing to dedup against. Known
/// limitation of the anonymity model, not silently "fixed".
pub async fn ingest(
    State(state): State<AppState>,
    Json(records): Json<Vec<SignalRecord>>,
) -> Result<Json<IngestResponse>, ApiError> {
    if records.is_empty() {
        return Err(ApiError::BadRequest(
            "batch must contain at least one record".to_string(),
        ));
    }

    let events = validate_batch(&records, Utc::now())?;
    signals::append_events(&state.db, &events).await?;
    info!("Accepted batch of {} signal event(s)", events.len());

    // Fan out only after the commit
    let mut touched: BTreeSet<(String, i64)> = BTreeSet::new();
    for event in &events {
        touched.insert((event.class_id.clone(), event.session_number));
        state
            .hub
            .emit(
                &event.class_id,
                ClassEvent::SignalReceived {
                    event: event.clone(),
                },
            )
            .await;
        state.alert_engine.observe(event.clone()).await;
    }

    for (class_id, session_number) in touched {
        match signals::fetch_session(&state.db, &class_id, session_number).await {
            Ok(session_events) => {
                let agg = aggregate(&class_id, session_number, &session_events);
                state
                    .hub
                    .emit(&class_id, ClassEvent::AggregateUpdated { aggregate: agg })
                    .await;
            }
            Err(e) => warn!(
                "Skipping aggregate update for ({}, {}): {}",
                class_id, session_number, e
            ),
        }
    }

    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        accepted: events.len(),
    }))
}
