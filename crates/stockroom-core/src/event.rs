//! Events emitted by the sync engine.
//!
//! Every transition of the queue is reported as a [`SyncEvent`]. Presentation
//! code derives its badge counters and spinners from this stream instead of
//! reading queue internals.

use serde::{Deserialize, Serialize};

use crate::types::OperationId;

/// A queue state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// An operation was persisted to the queue.
    OperationQueued { id: OperationId },
    /// A drain pass started.
    SyncStarted,
    /// An operation replayed successfully and left the queue.
    OperationSynced { id: OperationId },
    /// An operation exhausted its retries and was quarantined.
    OperationFailed { id: OperationId, error: String },
    /// A drain pass finished.
    SyncCompleted { synced: usize, failed: usize },
    /// A drain pass was aborted by a store failure.
    SyncError { message: String },
    /// Quarantined operations were cleared.
    FailedCleared { count: usize },
}

impl SyncEvent {
    /// The snake_case event name, as used in the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::OperationQueued { .. } => "operation_queued",
            SyncEvent::SyncStarted => "sync_started",
            SyncEvent::OperationSynced { .. } => "operation_synced",
            SyncEvent::OperationFailed { .. } => "operation_failed",
            SyncEvent::SyncCompleted { .. } => "sync_completed",
            SyncEvent::SyncError { .. } => "sync_error",
            SyncEvent::FailedCleared { .. } => "failed_cleared",
        }
    }
}
