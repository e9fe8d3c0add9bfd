//! Integration tests for classpulse-api endpoints
//!
//! Drives the real router with oneshot requests against a throwaway SQLite
//! event store. Covers ingestion (validation atomicity, auth), analytics
//! (the aggregate and comparison scenarios, zero-state reads), the recent
//! feed, live advisories and CSV export.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use classpulse_api::{build_router, AppState};
use classpulse_common::alerts::AlertRules;
use classpulse_common::config::ServiceConfig;

const TEST_KEY: &str = "test-key";

/// Test helper: fresh app over a temp database (keep the TempDir alive)
async fn setup_app() -> (axum::Router, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let config = ServiceConfig {
        port: 0,
        data_dir: dir.path().to_path_buf(),
        api_key: TEST_KEY.to_string(),
        alerts: AlertRules::builtin(),
    };
    let pool = classpulse_api::db::init_database(&config.database_path())
        .await
        .expect("init database");
    let state = AppState::new(pool, &config);
    (build_router(state), dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("X-API-Key", TEST_KEY)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-API-Key", TEST_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-API-Key", TEST_KEY)
        .body(Body::empty())
        .unwrap()
}

/// One wire record with the given one-hot kind set
fn signal(class_id: &str, student_id: &str, session: i64, kind: &str, confidence: i64) -> Value {
    let mut record = json!({
        "class_id": class_id,
        "student_id": student_id,
        "session_number": session,
        "stuck": 0,
        "got_it": 0,
        "pause": 0,
        "example": 0,
        "confidence": confidence,
    });
    record[kind] = json!(1);
    record
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _dir) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "classpulse-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_api_key() {
    let (app, _dir) = setup_app().await;

    // Missing key
    let request = Request::builder()
        .method("GET")
        .uri("/analytics/1234/1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong key
    let request = Request::builder()
        .method("GET")
        .uri("/analytics/1234/1")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Invalid API key");

    // Ingest is protected too
    let batch = json!([signal("1234", "s-1", 1, "stuck", 8)]);
    let request = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(batch.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Ingestion and aggregation
// =============================================================================

#[tokio::test]
async fn test_ingest_then_aggregate_scenario() {
    let (app, _dir) = setup_app().await;

    let batch = json!([
        signal("1234", "s-1", 1, "stuck", 8),
        signal("1234", "s-2", 1, "got_it", 6),
        signal("1234", "s-3", 1, "stuck", 4),
    ]);
    let response = app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["accepted"], 3);

    let response = app.oneshot(get("/analytics/1234/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let agg = extract_json(response.into_body()).await;
    assert_eq!(agg["signals"]["stuck"], 2);
    assert_eq!(agg["signals"]["gotIt"], 1);
    assert_eq!(agg["signals"]["pause"], 0);
    assert_eq!(agg["signals"]["example"], 0);
    assert_eq!(agg["totalSignalCount"], 3);
    assert_eq!(agg["participantCount"], 3);
    assert_eq!(agg["confusionRate"], 66.7);
    assert_eq!(agg["avgConfidenceRaw"], 6.0);
    assert_eq!(agg["avgConfidence"], 3.0);
}

#[tokio::test]
async fn test_invalid_batch_rejected_atomically() {
    let (app, _dir) = setup_app().await;

    // Record 1 (0-indexed) carries an out-of-range confidence
    let batch = json!([
        signal("1234", "s-1", 1, "stuck", 8),
        signal("1234", "s-2", 1, "got_it", 17),
        signal("1234", "s-3", 1, "pause", 4),
    ]);
    let response = app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["index"], 1);

    // Nothing from the rejected batch was persisted
    let agg = extract_json(
        app.oneshot(get("/analytics/1234/1"))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    assert_eq!(agg["totalSignalCount"], 0);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(post_json("/ingest", &json!([]))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_two_flags_set_rejected() {
    let (app, _dir) = setup_app().await;

    let mut record = signal("1234", "s-1", 1, "stuck", 5);
    record["got_it"] = json!(1);
    let response = app
        .oneshot(post_json("/ingest", &json!([record])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["index"], 0);
}

#[tokio::test]
async fn test_unknown_session_returns_zero_aggregate() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(get("/analytics/nobody/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let agg = extract_json(response.into_body()).await;
    assert_eq!(agg["totalSignalCount"], 0);
    assert_eq!(agg["confusionRate"], 0.0);
    assert_eq!(agg["avgConfidence"], 0.0);
    assert_eq!(agg["participantCount"], 0);
}

// =============================================================================
// Session comparison
// =============================================================================

#[tokio::test]
async fn test_session_comparison_improved() {
    let (app, _dir) = setup_app().await;

    // Session 1 averages UI 3.0, session 2 averages UI 4.0
    let batch = json!([
        signal("1234", "s-1", 1, "got_it", 6),
        signal("1234", "s-2", 2, "got_it", 8),
    ]);
    let response = app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/analytics/1234/compare")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = extract_json(response.into_body()).await;
    assert_eq!(result["deltas"]["avgConfidence"], 1.0);
    assert_eq!(result["trends"]["avgConfidence"], "improved");
    assert_eq!(result["trend"], "improved");
    assert_eq!(result["sessionA"]["sessionNumber"], 1);
    assert_eq!(result["sessionB"]["sessionNumber"], 2);
}

#[tokio::test]
async fn test_comparison_of_empty_sessions_is_stable() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(get("/analytics/nobody/compare")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = extract_json(response.into_body()).await;
    assert_eq!(result["trend"], "stable");
    assert_eq!(result["deltas"]["avgConfidence"], 0.0);
    assert_eq!(result["deltas"]["confusionRate"], 0.0);
}

// =============================================================================
// Recent activity feed
// =============================================================================

#[tokio::test]
async fn test_recent_signals_newest_first() {
    let (app, _dir) = setup_app().await;

    let batch = json!([
        signal("1234", "s-1", 1, "stuck", 2),
        signal("1234", "s-2", 1, "got_it", 4),
        signal("1234", "s-3", 1, "pause", 6),
    ]);
    app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();

    let response = app
        .oneshot(get("/signals/1234/recent?limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let records = extract_json(response.into_body()).await;
    let records = records.as_array().expect("array of wire records");
    assert_eq!(records.len(), 2);
    // Last appended comes first
    assert_eq!(records[0]["pause"], 1);
    assert_eq!(records[0]["confidence"], 6);
    assert_eq!(records[1]["got_it"], 1);
}

#[tokio::test]
async fn test_recent_signals_session_filter() {
    let (app, _dir) = setup_app().await;

    let batch = json!([
        signal("1234", "s-1", 1, "stuck", 2),
        signal("1234", "s-2", 2, "got_it", 4),
    ]);
    app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();

    let response = app
        .oneshot(get("/signals/1234/recent?session=2"))
        .await
        .unwrap();
    let records = extract_json(response.into_body()).await;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["session_number"], 2);
}

// =============================================================================
// Live advisories
// =============================================================================

/// Advisory evaluation runs on a worker task; poll the read endpoint
async fn wait_for_alert(app: &axum::Router, uri: &str) -> Value {
    for _ in 0..100 {
        let body = extract_json(
            app.clone()
                .oneshot(get(uri))
                .await
                .unwrap()
                .into_body(),
        )
        .await;
        if !body["alert"].is_null() {
            return body["alert"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("advisory never appeared at {uri}");
}

#[tokio::test]
async fn test_confusion_alert_raised_and_dismissed() {
    let (app, _dir) = setup_app().await;

    // Three live stuck taps, one batch each
    for i in 0..3 {
        let batch = json!([signal("1234", &format!("s-{i}"), 1, "stuck", 3)]);
        let response = app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let alert = wait_for_alert(&app, "/alerts/1234/1").await;
    assert_eq!(alert["severity"], "warning");
    assert_eq!(alert["signalKind"], "stuck");
    assert_eq!(alert["count"], 3);

    let response = app
        .clone()
        .oneshot(post_empty("/alerts/1234/1/dismiss"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["dismissed"], true);

    let body = extract_json(
        app.oneshot(get("/alerts/1234/1")).await.unwrap().into_body(),
    )
    .await;
    assert!(body["alert"].is_null());
}

#[tokio::test]
async fn test_alert_idle_before_threshold() {
    let (app, _dir) = setup_app().await;

    let batch = json!([signal("1234", "s-1", 1, "stuck", 3)]);
    app.clone().oneshot(post_json("/ingest", &batch)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let body = extract_json(
        app.oneshot(get("/alerts/1234/1")).await.unwrap().into_body(),
    )
    .await;
    assert!(body["alert"].is_null());
}

// =============================================================================
// CSV export
// =============================================================================

#[tokio::test]
async fn test_export_csv() {
    let (app, _dir) = setup_app().await;

    let mut first = signal("1234", "s-1", 1, "stuck", 8);
    first["timestamp"] = json!("2026-02-03T09:30:00Z");
    let mut second = signal("1234", "s-2", 1, "got_it", 6);
    second["timestamp"] = json!("2026-02-03T09:31:00Z");
    app.clone()
        .oneshot(post_json("/ingest", &json!([first, second])))
        .await
        .unwrap();

    let response = app.oneshot(get("/export/1234/csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/csv"));

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment; filename=\"session_1234_"));
    assert!(disposition.ends_with(".csv\""));

    let text = extract_text(response.into_body()).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Timestamp,Signal,Confidence");
    assert_eq!(lines[1], "2026-02-03T09:30:00+00:00,stuck,8");
    assert_eq!(lines[2], "2026-02-03T09:31:00+00:00,got_it,6");
}

#[tokio::test]
async fn test_export_empty_class_is_header_only() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(get("/export/nobody/csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = extract_text(response.into_body()).await;
    assert_eq!(text, "Timestamp,Signal,Confidence\n");
}

// =============================================================================
// Live event stream
// =============================================================================

#[tokio::test]
async fn test_event_stream_is_sse_without_auth() {
    let (app, _dir) = setup_app().await;

    // EventSource cannot set headers, so the stream carries no API key
    let request = Request::builder()
        .method("GET")
        .uri("/events/1234")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}
