//! Append-only signal event store
//!
//! Events are only ever inserted, never updated or deleted; every derived
//! statistic is recomputed from the rows on read. A batch append commits in
//! one transaction so a rejected or failed batch leaves no partial state.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use classpulse_common::analytics::SignalCounts;
use classpulse_common::signal::{SignalEvent, SignalKind};
use classpulse_common::{Error, Result};

/// Row shape of `signal_events` minus the rowid
type EventRow = (String, String, i64, String, i64, String);

const EVENT_COLUMNS: &str = "class_id, student_id, session_number, kind, confidence, timestamp";

/// Append a validated batch in a single transaction (all-or-nothing)
pub async fn append_events(pool: &SqlitePool, events: &[SignalEvent]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for event in events {
        sqlx::query(
            "INSERT INTO signal_events \
             (class_id, student_id, session_number, kind, confidence, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.class_id)
        .bind(&event.student_id)
        .bind(event.session_number)
        .bind(event.kind.wire_token())
        .bind(event.confidence)
        .bind(event.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// All events for one (class, session) key in append order
pub async fn fetch_session(
    pool: &SqlitePool,
    class_id: &str,
    session_number: i64,
) -> Result<Vec<SignalEvent>> {
    let rows: Vec<EventRow> = sqlx::query_as(&format!(
        "SELECT {} FROM signal_events \
         WHERE class_id = ? AND session_number = ? ORDER BY id",
        EVENT_COLUMNS
    ))
    .bind(class_id)
    .bind(session_number)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_event).collect()
}

/// All events for a class across sessions in append order
pub async fn fetch_class(pool: &SqlitePool, class_id: &str) -> Result<Vec<SignalEvent>> {
    let rows: Vec<EventRow> = sqlx::query_as(&format!(
        "SELECT {} FROM signal_events WHERE class_id = ? ORDER BY id",
        EVENT_COLUMNS
    ))
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_event).collect()
}

/// Session numbers observed for a class, ascending
pub async fn list_sessions(pool: &SqlitePool, class_id: &str) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT DISTINCT session_number FROM signal_events \
         WHERE class_id = ? ORDER BY session_number",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(n,)| n).collect())
}

/// The most recently appended events for a class, newest first
pub async fn recent(
    pool: &SqlitePool,
    class_id: &str,
    session_number: Option<i64>,
    limit: i64,
) -> Result<Vec<SignalEvent>> {
    let rows: Vec<EventRow> = match session_number {
        Some(session) => {
            sqlx::query_as(&format!(
                "SELECT {} FROM signal_events \
                 WHERE class_id = ? AND session_number = ? ORDER BY id DESC LIMIT ?",
                EVENT_COLUMNS
            ))
            .bind(class_id)
            .bind(session)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(&format!(
                "SELECT {} FROM signal_events \
                 WHERE class_id = ? ORDER BY id DESC LIMIT ?",
                EVENT_COLUMNS
            ))
            .bind(class_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(row_to_event).collect()
}

/// Rolling per-kind counts for one (class, session) key
///
/// The alerting engine recomputes these on every observed event, so the
/// query stays a grouped count rather than a row fetch.
pub async fn session_counts(
    pool: &SqlitePool,
    class_id: &str,
    session_number: i64,
) -> Result<SignalCounts> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT kind, COUNT(*) FROM signal_events \
         WHERE class_id = ? AND session_number = ? GROUP BY kind",
    )
    .bind(class_id)
    .bind(session_number)
    .fetch_all(pool)
    .await?;

    let mut counts = SignalCounts::default();
    for (token, count) in rows {
        let count = count.max(0) as u64;
        match SignalKind::from_wire_token(&token) {
            Some(SignalKind::Stuck) => counts.stuck += count,
            Some(SignalKind::GotIt) => counts.got_it += count,
            Some(SignalKind::Pause) => counts.pause += count,
            Some(SignalKind::ExampleRequest) => counts.example += count,
            None => {}
        }
    }
    Ok(counts)
}

fn row_to_event(row: EventRow) -> Result<SignalEvent> {
    let (class_id, student_id, session_number, kind, confidence, timestamp) = row;
    let kind = SignalKind::from_wire_token(&kind)
        .ok_or_else(|| Error::Internal(format!("Unknown signal kind in store: {}", kind)))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| Error::Internal(format!("Bad timestamp in store: {}", e)))?
        .with_timezone(&Utc);

    Ok(SignalEvent {
        class_id,
        student_id,
        session_number,
        kind,
        confidence,
        timestamp,
    })
}
