//! Common error types for ClassPulse

use thiserror::Error;

/// Common result type for ClassPulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the ClassPulse crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A batch record failed validation; the whole batch is rejected
    #[error("Invalid record at index {index}: {reason}")]
    Validation { index: usize, reason: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
