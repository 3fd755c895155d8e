//! Pending operations: the only entity the engine persists.
//!
//! A [`PendingOperation`] is a write the application tried to perform against
//! the inventory backend while it was offline. Everything except the retry
//! bookkeeping (`retry_count`, `status`, `last_error`) is immutable once the
//! record exists.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::types::OperationId;

/// Kind of write captured by a pending operation.
///
/// The type selects the HTTP verb used on replay. Records read back from
/// storage with a type this build does not know are kept as
/// [`OperationType::Unknown`] so that they flow to the executor and fail
/// there, instead of making the whole queue unreadable.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Collect,
    WriteOff,
    Unknown(String),
}

impl OperationType {
    /// All known operation types.
    pub const KNOWN: [OperationType; 5] = [
        OperationType::Create,
        OperationType::Update,
        OperationType::Delete,
        OperationType::Collect,
        OperationType::WriteOff,
    ];

    /// Wire name of the type (`CREATE`, `WRITE_OFF`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Create => "CREATE",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::Collect => "COLLECT",
            OperationType::WriteOff => "WRITE_OFF",
            OperationType::Unknown(name) => name,
        }
    }

    /// Whether this is one of the known types.
    pub fn is_known(&self) -> bool {
        !matches!(self, OperationType::Unknown(_))
    }
}

impl From<String> for OperationType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "CREATE" => OperationType::Create,
            "UPDATE" => OperationType::Update,
            "DELETE" => OperationType::Delete,
            "COLLECT" => OperationType::Collect,
            "WRITE_OFF" => OperationType::WriteOff,
            _ => OperationType::Unknown(name),
        }
    }
}

impl From<&str> for OperationType {
    fn from(name: &str) -> Self {
        OperationType::from(name.to_string())
    }
}

impl From<OperationType> for String {
    fn from(op_type: OperationType) -> Self {
        match op_type {
            OperationType::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Debug for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Unknown(name) => write!(f, "Unknown({name})"),
            known => f.write_str(known.as_str()),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replay status of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting to be replayed.
    Pending,
    /// Quarantined after exhausting its retries. Terminal.
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation as submitted by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_id: Option<String>,
}

impl NewOperation {
    /// Start building an operation of the given type against `endpoint`.
    pub fn new(op_type: OperationType, endpoint: impl Into<String>) -> Self {
        Self {
            op_type,
            endpoint: endpoint.into(),
            method: None,
            data: None,
            hotel_id: None,
        }
    }

    /// Override the HTTP verb implied by the operation type.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the request payload.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the tenant the operation belongs to.
    pub fn hotel_id(mut self, hotel_id: impl Into<String>) -> Self {
        self.hotel_id = Some(hotel_id.into());
        self
    }

    /// Check the operation can be persisted.
    ///
    /// The type is deliberately not checked here: an unknown type is only
    /// detected when the executor tries to dispatch it.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(CoreError::EmptyEndpoint);
        }
        match &self.data {
            None | Some(Value::Object(_)) | Some(Value::Null) => {}
            Some(Value::Array(_)) => return Err(CoreError::InvalidPayload("array")),
            Some(Value::String(_)) => return Err(CoreError::InvalidPayload("string")),
            Some(Value::Number(_)) => return Err(CoreError::InvalidPayload("number")),
            Some(Value::Bool(_)) => return Err(CoreError::InvalidPayload("boolean")),
        }
        if let Some(method) = &self.method {
            if method.trim().is_empty() {
                return Err(CoreError::InvalidOperation(
                    "method override must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Turn the submission into a fresh pending record.
    pub fn into_pending(self, id: OperationId, timestamp: String) -> PendingOperation {
        PendingOperation {
            id,
            op_type: self.op_type,
            endpoint: self.endpoint,
            method: self.method,
            data: self.data.filter(|d| !d.is_null()),
            hotel_id: self.hotel_id,
            timestamp,
            retry_count: 0,
            status: OperationStatus::Pending,
            last_error: None,
        }
    }
}

/// A write captured while offline, persisted until it replays successfully or
/// is cleared after quarantine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_id: Option<String>,
    /// RFC 3339 creation time.
    pub timestamp: String,
    #[serde(default)]
    pub retry_count: u32,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingOperation {
    /// Create a pending record with a generated id and the current time.
    pub fn create(new: NewOperation) -> Result<Self> {
        new.validate()?;
        Ok(new.into_pending(OperationId::generate(), chrono::Utc::now().to_rfc3339()))
    }

    pub fn is_pending(&self) -> bool {
        self.status == OperationStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == OperationStatus::Failed
    }

    /// Record one failed replay attempt.
    ///
    /// Increments `retry_count`, stores the message and quarantines the
    /// record once `max_retries` is reached. Returns `true` if this call moved
    /// the record to `failed`. Calling it on an already failed record is a
    /// no-op that returns `false`.
    pub fn record_failure(&mut self, error: impl Into<String>, max_retries: u32) -> bool {
        if self.is_failed() {
            return false;
        }
        self.retry_count = self.retry_count.saturating_add(1).min(max_retries);
        self.last_error = Some(error.into());
        if self.retry_count >= max_retries {
            self.status = OperationStatus::Failed;
            return true;
        }
        false
    }

    /// Quarantine immediately, regardless of remaining retries.
    ///
    /// Used for failures that can never succeed on replay. The retry count is
    /// still advanced by one so it reflects the attempt that was made.
    pub fn quarantine(&mut self, error: impl Into<String>, max_retries: u32) -> bool {
        if self.is_failed() {
            return false;
        }
        self.retry_count = self.retry_count.saturating_add(1).min(max_retries);
        self.last_error = Some(error.into());
        self.status = OperationStatus::Failed;
        true
    }

    /// Size of the record's JSON encoding, used for queue byte limits.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}
