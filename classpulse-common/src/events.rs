//! Class event types and per-class broadcast hub
//!
//! Live delivery is a publish/subscribe relation keyed by class_id, not a
//! polling loop. The hub hands out `tokio::broadcast` channels per class:
//! publishing never blocks, slow subscribers lag and drop rather than stall
//! ingestion, and a disconnected consumer just stops receiving.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::alerts::TipAlert;
use crate::analytics::SessionAggregate;
use crate::signal::SignalEvent;

/// Events delivered on a class channel
///
/// Serialized for SSE transmission; the tag doubles as the SSE event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClassEvent {
    /// Recomputed aggregates for every session of the class, sent to a
    /// consumer on connect so reconnects resume from live state
    CurrentState {
        aggregates: Vec<SessionAggregate>,
        timestamp: DateTime<Utc>,
    },

    /// A newly ingested signal event
    SignalReceived { event: SignalEvent },

    /// Aggregate recomputed after a batch append
    AggregateUpdated { aggregate: SessionAggregate },

    /// Advisory raised by the live alerting engine
    TipRaised {
        session_number: i64,
        alert: TipAlert,
    },

    /// Advisory dismissed by the consumer
    TipDismissed {
        session_number: i64,
        timestamp: DateTime<Utc>,
    },
}

impl ClassEvent {
    /// SSE event name for this variant
    pub fn event_type(&self) -> &'static str {
        match self {
            ClassEvent::CurrentState { .. } => "CurrentState",
            ClassEvent::SignalReceived { .. } => "SignalReceived",
            ClassEvent::AggregateUpdated { .. } => "AggregateUpdated",
            ClassEvent::TipRaised { .. } => "TipRaised",
            ClassEvent::TipDismissed { .. } => "TipDismissed",
        }
    }
}

/// Per-class event distribution hub
///
/// Channels are created lazily on first subscription. Emitting to a class
/// with no channel (or no receivers) is a no-op: ingestion success never
/// depends on connected consumers.
pub struct ClassEventHub {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<ClassEvent>>>,
}

impl ClassEventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to all future events for a class
    pub async fn subscribe(&self, class_id: &str) -> broadcast::Receiver<ClassEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(class_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Emit an event to all subscribers of a class
    pub async fn emit(&self, class_id: &str, event: ClassEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(class_id) {
            // Ignore send errors (no receivers is OK)
            let _ = tx.send(event);
        }
    }
}
