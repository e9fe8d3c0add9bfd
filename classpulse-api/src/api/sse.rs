//! Live event stream per class
//!
//! One SSE channel per class_id, backed by the class broadcast hub. On
//! connect the consumer receives a ConnectionStatus frame and a
//! CurrentState snapshot (recomputed aggregates for every session of the
//! class) so a reconnect resumes from live state, then hub events as they
//! happen. A slow consumer lags and drops events rather than stalling the
//! hub; a disconnected one simply stops receiving.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use classpulse_common::analytics::aggregate;
use classpulse_common::events::ClassEvent;

use crate::db::signals;
use crate::AppState;

/// GET /events/{class_id}
pub async fn event_stream(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE consumer for class {}", class_id);

    // Subscribe before the snapshot so nothing between the two is lost
    let rx = state.hub.subscribe(&class_id).await;
    let snapshot = current_state(&state, &class_id).await;

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        if let Some(event) = to_sse(&snapshot) {
            yield Ok(event);
        }

        let mut live = BroadcastStream::new(rx);
        while let Some(result) = live.next().await {
            match result {
                Ok(event) => {
                    if let Some(event) = to_sse(&event) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    // Lagged consumer: skip what was lost, keep streaming
                    warn!("SSE consumer for class {} lagged: {}", class_id, e);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Recomputed aggregates for every session of the class
async fn current_state(state: &AppState, class_id: &str) -> ClassEvent {
    let mut aggregates = Vec::new();
    match signals::list_sessions(&state.db, class_id).await {
        Ok(sessions) => {
            for session_number in sessions {
                match signals::fetch_session(&state.db, class_id, session_number).await {
                    Ok(events) => aggregates.push(aggregate(class_id, session_number, &events)),
                    Err(e) => warn!("Snapshot skipped session {}: {}", session_number, e),
                }
            }
        }
        Err(e) => warn!("Snapshot unavailable for class {}: {}", class_id, e),
    }
    ClassEvent::CurrentState {
        aggregates,
        timestamp: Utc::now(),
    }
}

fn to_sse(event: &ClassEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
