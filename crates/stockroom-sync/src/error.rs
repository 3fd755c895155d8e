//! Error types for the sync module.

use thiserror::Error;

/// Errors raised while replaying a single operation.
///
/// These never escape a drain pass: they are turned into retry bookkeeping on
/// the record and into [`SyncEvent`](stockroom_core::SyncEvent)s.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The record's type has no dispatch entry.
    #[error("unknown operation type: {0}")]
    UnknownOperationType(String),

    /// The record's method override is not a valid HTTP verb.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The executor itself is misconfigured (base URL, headers).
    #[error("executor configuration error: {0}")]
    Config(String),
}

impl ExecutorError {
    /// Whether replaying the same record again can never succeed.
    ///
    /// Covers 4xx answers (except 408 Request Timeout and 429 Too Many
    /// Requests) and records the executor cannot even dispatch.
    pub fn is_client_error(&self) -> bool {
        match self {
            ExecutorError::UnknownOperationType(_) | ExecutorError::InvalidMethod(_) => true,
            ExecutorError::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            ExecutorError::Transport(_) | ExecutorError::Decode(_) | ExecutorError::Config(_) => {
                false
            }
        }
    }
}

/// Errors that can occur during sync manager operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] stockroom_store::StoreError),

    /// The submitted operation was rejected before reaching the store.
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] stockroom_core::CoreError),

    /// Executor construction or configuration failed.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
