//! # ClassPulse Common Library
//!
//! Shared code for the ClassPulse service crates including:
//! - Signal event model and wire-format validation
//! - Analytics engines (session aggregation, session comparison)
//! - Live alert threshold rules
//! - Event types and per-class broadcast hub
//! - Configuration loading
//! - Error types

pub mod alerts;
pub mod analytics;
pub mod config;
pub mod error;
pub mod events;
pub mod signal;

pub use error::{Error, Result};
