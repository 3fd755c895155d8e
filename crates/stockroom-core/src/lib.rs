//! # Stockroom Core
//!
//! Pure data model for the Stockroom offline sync engine.
//!
//! This crate contains no I/O, no storage, no networking. It defines the
//! records that get persisted while the device is offline and the events the
//! sync engine emits while replaying them.
//!
//! ## Key Types
//!
//! - [`PendingOperation`] - A write captured offline, waiting to be replayed
//! - [`NewOperation`] - What a caller hands to the engine to enqueue
//! - [`OperationId`] - Unique, time-prefixed identifier of a pending operation
//! - [`OperationType`] - Discriminator that selects the HTTP verb on replay
//! - [`OperationStatus`] - `pending` or quarantined as `failed`
//! - [`SyncEvent`] - Notification emitted on every queue state transition

pub mod error;
pub mod event;
pub mod operation;
pub mod types;

pub use error::{CoreError, Result};
pub use event::SyncEvent;
pub use operation::{NewOperation, OperationStatus, OperationType, PendingOperation};
pub use types::OperationId;

/// Number of failed replays after which an operation is quarantined.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
