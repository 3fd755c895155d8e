//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The queue is full; the new record was not written.
    #[error("queue quota exceeded: {limit} limit of {max} reached")]
    QuotaExceeded { limit: &'static str, max: usize },

    /// The store cannot be used (poisoned lock, closed handle, injected fault).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Background task running a blocking call failed.
    #[error("blocking task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
