//! Signal event model and wire-format validation
//!
//! One `SignalEvent` is a single anonymous student interaction: a live tap
//! on a signal button, or one record of a reflection-mode submission. The
//! wire format keeps the original one-hot integer flags for backward
//! compatibility with existing clients; the domain model collapses them
//! into a `SignalKind`.
//!
//! # Anonymity contract
//!
//! `student_id` is an ephemeral token regenerated by the client per
//! submission or session. No two events are guaranteed to share a student
//! across submissions; participant counts derived from it are approximate
//! by design. This also means duplicate submissions (client retries) create
//! duplicate events: with no stable event identity there is nothing to
//! dedup against.
//!
//! # Confidence scale
//!
//! The UI collects confidence on a 1-5 scale and doubles it on the way in.
//! Events therefore carry confidence in [1, 10]. This scaling is a fixed
//! wire contract; any conversion back to the UI scale happens exactly once,
//! in the aggregation engine, as an explicitly named output.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Confidence bounds on the wire scale (UI 1-5 doubled by the client)
pub const CONFIDENCE_MIN: i64 = 1;
pub const CONFIDENCE_MAX: i64 = 10;

/// Client timestamps further in the future than this get a receipt time
pub const FUTURE_TOLERANCE_SECS: i64 = 300;

/// The four signal kinds a student can send
///
/// Mutually exclusive per event: one event carries exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Stuck,
    GotIt,
    Pause,
    #[serde(rename = "example")]
    ExampleRequest,
}

impl SignalKind {
    /// All kinds in fixed declaration order
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Stuck,
        SignalKind::GotIt,
        SignalKind::Pause,
        SignalKind::ExampleRequest,
    ];

    /// Token used in the wire format, the event store and the CSV export
    pub fn wire_token(self) -> &'static str {
        match self {
            SignalKind::Stuck => "stuck",
            SignalKind::GotIt => "got_it",
            SignalKind::Pause => "pause",
            SignalKind::ExampleRequest => "example",
        }
    }

    /// Inverse of [`wire_token`](Self::wire_token)
    pub fn from_wire_token(token: &str) -> Option<SignalKind> {
        match token {
            "stuck" => Some(SignalKind::Stuck),
            "got_it" => Some(SignalKind::GotIt),
            "pause" => Some(SignalKind::Pause),
            "example" => Some(SignalKind::ExampleRequest),
            _ => None,
        }
    }
}

/// One validated student interaction (domain form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Teacher-chosen class/session code; uniqueness is advisory only
    pub class_id: String,
    /// Ephemeral anonymous token; no cross-event linkage guaranteed
    pub student_id: String,
    /// Class meeting ordinal, 1-based (the comparison view uses 1 and 2)
    pub session_number: i64,
    pub kind: SignalKind,
    /// Wire scale [1, 10]
    pub confidence: i64,
    /// Client clock, unordered; server receipt time when missing or bogus
    pub timestamp: DateTime<Utc>,
}

/// One ingest record as it appears on the wire
///
/// The signal is encoded as one-hot integer flags with exactly one set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub class_id: String,
    pub student_id: String,
    pub session_number: i64,
    pub stuck: i64,
    pub got_it: i64,
    pub pause: i64,
    pub example: i64,
    pub confidence: i64,
    /// ISO-8601; filled with the server receipt time when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&SignalEvent> for SignalRecord {
    fn from(event: &SignalEvent) -> Self {
        Self {
            class_id: event.class_id.clone(),
            student_id: event.student_id.clone(),
            session_number: event.session_number,
            stuck: (event.kind == SignalKind::Stuck) as i64,
            got_it: (event.kind == SignalKind::GotIt) as i64,
            pause: (event.kind == SignalKind::Pause) as i64,
            example: (event.kind == SignalKind::ExampleRequest) as i64,
            confidence: event.confidence,
            timestamp: Some(event.timestamp),
        }
    }
}

/// Validate a whole batch atomically
///
/// The first invalid record rejects the batch, identifying its 0-indexed
/// position; nothing from a rejected batch may be persisted.
pub fn validate_batch(
    records: &[SignalRecord],
    received_at: DateTime<Utc>,
) -> Result<Vec<SignalEvent>> {
    let mut events = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let event = validate_record(record, received_at)
            .map_err(|reason| Error::Validation { index, reason })?;
        events.push(event);
    }
    Ok(events)
}

/// Convert one wire record into a domain event, or explain why it is invalid
fn validate_record(
    record: &SignalRecord,
    received_at: DateTime<Utc>,
) -> std::result::Result<SignalEvent, String> {
    if record.class_id.trim().is_empty() {
        return Err("class_id must be non-empty".to_string());
    }
    if record.student_id.trim().is_empty() {
        return Err("student_id must be non-empty".to_string());
    }
    if record.session_number < 1 {
        return Err(format!(
            "session_number must be >= 1, got {}",
            record.session_number
        ));
    }
    let kind = one_hot_kind(record)?;
    if !(CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&record.confidence) {
        return Err(format!(
            "confidence must be within [{}, {}], got {}",
            CONFIDENCE_MIN, CONFIDENCE_MAX, record.confidence
        ));
    }

    Ok(SignalEvent {
        class_id: record.class_id.trim().to_string(),
        student_id: record.student_id.trim().to_string(),
        session_number: record.session_number,
        kind,
        confidence: record.confidence,
        timestamp: normalize_timestamp(record.timestamp, received_at),
    })
}

/// Resolve the one-hot flag set to a single kind
fn one_hot_kind(record: &SignalRecord) -> std::result::Result<SignalKind, String> {
    let flags = [
        (SignalKind::Stuck, record.stuck),
        (SignalKind::GotIt, record.got_it),
        (SignalKind::Pause, record.pause),
        (SignalKind::ExampleRequest, record.example),
    ];
    for (kind, flag) in flags {
        if flag != 0 && flag != 1 {
            return Err(format!(
                "{} flag must be 0 or 1, got {}",
                kind.wire_token(),
                flag
            ));
        }
    }
    let mut set = flags.iter().filter(|(_, flag)| *flag == 1).map(|(kind, _)| *kind);
    match (set.next(), set.next()) {
        (Some(kind), None) => Ok(kind),
        (None, _) => Err("exactly one signal flag must be set, got none".to_string()),
        (Some(_), Some(_)) => {
            Err("exactly one signal flag must be set, got more than one".to_string())
        }
    }
}

/// Server receipt time replaces a missing or clearly bogus client timestamp
///
/// Bogus means further in the future than [`FUTURE_TOLERANCE_SECS`] (client
/// clocks drift, they do not time-travel) or before the sane epoch floor.
pub fn normalize_timestamp(
    client: Option<DateTime<Utc>>,
    received_at: DateTime<Utc>,
) -> DateTime<Utc> {
    match client {
        Some(ts) if ts > received_at + Duration::seconds(FUTURE_TOLERANCE_SECS) => received_at,
        Some(ts) if ts < sane_epoch_floor() => received_at,
        Some(ts) => ts,
        None => received_at,
    }
}

/// No classroom produced signal events before this date
pub fn sane_epoch_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}
