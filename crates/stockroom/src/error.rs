//! Error types for the engine facade.

use stockroom_core::CoreError;
use stockroom_store::StoreError;
use stockroom_sync::{ExecutorError, SyncError};
use thiserror::Error;

/// Errors that can occur while opening or driving an [`Engine`](crate::Engine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted operation was rejected.
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Executor or probe could not be built.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
