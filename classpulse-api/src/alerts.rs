//! Live alerting engine runtime
//!
//! One sequential worker task per (class_id, session_number) serializes
//! advisory evaluation: events for a session are queued and handled one at
//! a time, so concurrent ingestion cannot race on the same session's
//! advisory state. For each observed event the worker recomputes the
//! session's rolling counts from the event store (the append has committed
//! before the event reaches the queue) and evaluates the rule table; the
//! first firing rule replaces any standing advisory.
//!
//! A session with no standing advisory is Idle. An empty rule table keeps
//! every session Idle forever; ingestion is unaffected either way.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use classpulse_common::alerts::{evaluate, AlertRules, TipAlert};
use classpulse_common::events::{ClassEvent, ClassEventHub};
use classpulse_common::signal::SignalEvent;

use crate::db::signals;

type SessionKey = (String, i64);

/// Handle to one session's worker
struct SessionHandle {
    queue: mpsc::UnboundedSender<SignalEvent>,
    advisory: Arc<RwLock<Option<TipAlert>>>,
}

/// Threshold alerting over the live event stream
pub struct AlertEngine {
    db: SqlitePool,
    hub: Arc<ClassEventHub>,
    rules: AlertRules,
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl AlertEngine {
    pub fn new(db: SqlitePool, hub: Arc<ClassEventHub>, rules: AlertRules) -> Self {
        if rules.is_empty() {
            info!("Alert rule table is empty; live alerting stays Idle");
        }
        Self {
            db,
            hub,
            rules,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Queue a newly ingested event for its session's worker
    ///
    /// Returns as soon as the event is queued; evaluation happens on the
    /// worker task and never blocks ingestion.
    pub async fn observe(&self, event: SignalEvent) {
        if self.rules.is_empty() {
            return;
        }
        let key = (event.class_id.clone(), event.session_number);
        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .entry(key)
            .or_insert_with(|| self.spawn_worker(event.class_id.clone(), event.session_number));
        if handle.queue.send(event).is_err() {
            warn!("Alert worker queue closed; event not evaluated");
        }
    }

    /// Current advisory for a session (None = Idle)
    pub async fn current(&self, class_id: &str, session_number: i64) -> Option<TipAlert> {
        let sessions = self.sessions.read().await;
        match sessions.get(&(class_id.to_string(), session_number)) {
            Some(handle) => handle.advisory.read().await.clone(),
            None => None,
        }
    }

    /// Dismiss the standing advisory, returning whether one was standing
    pub async fn dismiss(&self, class_id: &str, session_number: i64) -> bool {
        let advisory = {
            let sessions = self.sessions.read().await;
            match sessions.get(&(class_id.to_string(), session_number)) {
                Some(handle) => handle.advisory.clone(),
                None => return false,
            }
        };
        let had_alert = advisory.write().await.take().is_some();
        if had_alert {
            self.hub
                .emit(
                    class_id,
                    ClassEvent::TipDismissed {
                        session_number,
                        timestamp: Utc::now(),
                    },
                )
                .await;
        }
        had_alert
    }

    fn spawn_worker(&self, class_id: String, session_number: i64) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let advisory = Arc::new(RwLock::new(None));
        tokio::spawn(run_session_worker(
            self.db.clone(),
            self.hub.clone(),
            self.rules.clone(),
            class_id,
            session_number,
            advisory.clone(),
            rx,
        ));
        SessionHandle { queue: tx, advisory }
    }
}

/// Sequential per-session evaluation loop
async fn run_session_worker(
    db: SqlitePool,
    hub: Arc<ClassEventHub>,
    rules: AlertRules,
    class_id: String,
    session_number: i64,
    advisory: Arc<RwLock<Option<TipAlert>>>,
    mut queue: mpsc::UnboundedReceiver<SignalEvent>,
) {
    debug!("Alert worker started for ({}, {})", class_id, session_number);
    while let Some(event) = queue.recv().await {
        let counts = match signals::session_counts(&db, &class_id, session_number).await {
            Ok(counts) => counts,
            Err(e) => {
                // Store trouble degrades this evaluation, not ingestion
                warn!(
                    "Alert evaluation skipped for ({}, {}): {}",
                    class_id, session_number, e
                );
                continue;
            }
        };
        if let Some(alert) = evaluate(&rules, &counts, event.kind, Utc::now()) {
            info!(
                "Advisory raised for ({}, {}): {:?} after {} {} signal(s)",
                class_id,
                session_number,
                alert.severity,
                alert.count,
                alert.signal_kind.wire_token()
            );
            *advisory.write().await = Some(alert.clone());
            hub.emit(
                &class_id,
                ClassEvent::TipRaised {
                    session_number,
                    alert,
                },
            )
            .await;
        }
    }
    debug!("Alert worker stopped for ({}, {})", class_id, session_number);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use classpulse_common::alerts::Severity;
    use classpulse_common::signal::SignalKind;
    use tempfile::TempDir;

    use crate::db;

    async fn test_pool() -> (SqlitePool, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let pool = db::init_database(&dir.path().join("test.db"))
            .await
            .expect("init database");
        (pool, dir)
    }

    fn event(kind: SignalKind, student: &str) -> SignalEvent {
        SignalEvent {
            class_id: "1234".to_string(),
            student_id: student.to_string(),
            session_number: 1,
            kind,
            confidence: 5,
            timestamp: Utc::now(),
        }
    }

    /// Append to the store then hand to the engine, like the ingest path
    async fn ingest_one(pool: &SqlitePool, engine: &AlertEngine, event: SignalEvent) {
        signals::append_events(pool, &[event.clone()]).await.unwrap();
        engine.observe(event).await;
    }

    async fn wait_for_advisory(engine: &AlertEngine) -> TipAlert {
        for _ in 0..100 {
            if let Some(alert) = engine.current("1234", 1).await {
                return alert;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("advisory never raised");
    }

    #[tokio::test]
    async fn test_third_stuck_tap_raises_warning() {
        let (pool, _dir) = test_pool().await;
        let hub = Arc::new(ClassEventHub::new(16));
        let engine = AlertEngine::new(pool.clone(), hub.clone(), AlertRules::builtin());
        let mut rx = hub.subscribe("1234").await;

        for i in 0..3 {
            ingest_one(&pool, &engine, event(SignalKind::Stuck, &format!("s-{i}"))).await;
        }

        let alert = wait_for_advisory(&engine).await;
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.signal_kind, SignalKind::Stuck);
        assert_eq!(alert.count, 3);

        // The hub saw the TipRaised too
        let raised = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let ClassEvent::TipRaised { alert, .. } = rx.recv().await.unwrap() {
                    break alert;
                }
            }
        })
        .await
        .expect("TipRaised on hub");
        assert_eq!(raised.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_dismiss_returns_to_idle() {
        let (pool, _dir) = test_pool().await;
        let hub = Arc::new(ClassEventHub::new(16));
        let engine = AlertEngine::new(pool.clone(), hub, AlertRules::builtin());

        for i in 0..2 {
            ingest_one(&pool, &engine, event(SignalKind::Pause, &format!("s-{i}"))).await;
        }
        wait_for_advisory(&engine).await;

        assert!(engine.dismiss("1234", 1).await);
        assert!(engine.current("1234", 1).await.is_none());
        // Second dismissal finds nothing standing
        assert!(!engine.dismiss("1234", 1).await);
    }

    #[tokio::test]
    async fn test_below_threshold_stays_idle() {
        let (pool, _dir) = test_pool().await;
        let hub = Arc::new(ClassEventHub::new(16));
        let engine = AlertEngine::new(pool.clone(), hub, AlertRules::builtin());

        ingest_one(&pool, &engine, event(SignalKind::Stuck, "s-0")).await;
        ingest_one(&pool, &engine, event(SignalKind::Stuck, "s-1")).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.current("1234", 1).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_rule_table_stays_idle() {
        let (pool, _dir) = test_pool().await;
        let hub = Arc::new(ClassEventHub::new(16));
        let engine = AlertEngine::new(pool.clone(), hub, AlertRules::default());

        for i in 0..6 {
            ingest_one(&pool, &engine, event(SignalKind::Stuck, &format!("s-{i}"))).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.current("1234", 1).await.is_none());
        assert!(!engine.dismiss("1234", 1).await);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_advisories() {
        let (pool, _dir) = test_pool().await;
        let hub = Arc::new(ClassEventHub::new(16));
        let engine = AlertEngine::new(pool.clone(), hub, AlertRules::builtin());

        for i in 0..3 {
            ingest_one(&pool, &engine, event(SignalKind::Stuck, &format!("s-{i}"))).await;
        }
        wait_for_advisory(&engine).await;

        // Session 2 of the same class never saw an event
        assert!(engine.current("1234", 2).await.is_none());
    }
}
