//! classpulse-api library - session analytics and live-signal ingestion
//!
//! Turns a stream of anonymous per-student signal events into class-level
//! statistics and live advisories: ingestion gateway, append-only event
//! store, aggregation/comparison reads, threshold alerting, CSV export and
//! an SSE channel per class.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use classpulse_common::config::ServiceConfig;
use classpulse_common::events::ClassEventHub;

pub mod alerts;
pub mod api;
pub mod db;
pub mod error;
pub mod export;

pub use error::ApiError;

use alerts::AlertEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (append-only event store)
    pub db: SqlitePool,
    /// Per-class broadcast hub feeding the SSE streams
    pub hub: Arc<ClassEventHub>,
    /// Live alerting engine (one sequential worker per session)
    pub alert_engine: Arc<AlertEngine>,
    /// Shared secret expected in the X-API-Key header
    pub api_key: String,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: &ServiceConfig) -> Self {
        let hub = Arc::new(ClassEventHub::new(256));
        let alert_engine = Arc::new(AlertEngine::new(
            db.clone(),
            hub.clone(),
            config.alerts.clone(),
        ));
        Self {
            db,
            hub,
            alert_engine,
            api_key: config.api_key.clone(),
        }
    }
}

/// Build application router
///
/// Data-bearing endpoints require the shared secret; the health endpoint is
/// for monitors and the SSE stream stays open because the browser
/// EventSource API cannot set request headers.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require the API key header)
    let protected = Router::new()
        .route("/ingest", post(api::ingest))
        .route("/analytics/:class_id/compare", get(api::session_comparison))
        .route("/analytics/:class_id/:session_number", get(api::session_analytics))
        .route("/signals/:class_id/recent", get(api::recent_signals))
        .route("/alerts/:class_id/:session_number", get(api::current_alert))
        .route("/alerts/:class_id/:session_number/dismiss", post(api::dismiss_alert))
        .route("/export/:class_id/csv", get(api::export_csv))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/health", get(api::health))
        .route("/events/:class_id", get(api::event_stream));

    // Combine routers
    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
