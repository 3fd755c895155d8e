//! Strong type definitions for Stockroom.
//!
//! Identifiers are newtypes so a raw endpoint or hotel id can never be passed
//! where an operation id is expected.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a pending operation.
///
/// Generated at enqueue time as `<unix-millis>-<8 hex chars>`. The millisecond
/// prefix makes ids roughly sortable by creation time; the random suffix keeps
/// them unique when several operations are queued within the same millisecond.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a fresh id from the current clock and a random suffix.
    pub fn generate() -> Self {
        Self::generate_at(chrono::Utc::now().timestamp_millis())
    }

    /// Generate an id with the given millisecond prefix.
    pub fn generate_at(unix_millis: i64) -> Self {
        let mut suffix = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut suffix);
        Self(format!("{}-{}", unix_millis, hex::encode(suffix)))
    }

    /// Wrap an existing id string (e.g. one read back from storage).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
