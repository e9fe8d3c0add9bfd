//! HTTP API handlers for classpulse-api

pub mod alerts;
pub mod analytics;
pub mod auth;
pub mod export;
pub mod health;
pub mod ingest;
pub mod signals;
pub mod sse;

pub use alerts::{current_alert, dismiss_alert};
pub use analytics::{session_analytics, session_comparison};
pub use auth::auth_middleware;
pub use export::export_csv;
pub use health::health;
pub use ingest::ingest;
pub use signals::recent_signals;
pub use sse::event_stream;
