//! Error types for Stockroom Core.

use thiserror::Error;

/// Errors raised while building or validating operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("operation endpoint must not be empty")]
    EmptyEndpoint,

    #[error("operation payload must be a JSON object, got {0}")]
    InvalidPayload(&'static str),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
