//! # Stockroom Store
//!
//! Durable queue storage for the Stockroom sync engine. Provides a trait-based
//! interface for pending-operation persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store abstracts the offline queue behind the [`QueueStore`] trait,
//! allowing the sync engine to be storage-agnostic. The primary
//! implementation is [`SqliteQueueStore`], with [`MemoryQueueStore`] for
//! testing.
//!
//! ## Key Types
//!
//! - [`QueueStore`] - The async trait for all storage operations
//! - [`QueueStoreExt`] - Status queries derived from `list`
//! - [`SqliteQueueStore`] - SQLite-based persistent storage
//! - [`MemoryQueueStore`] - In-memory storage for tests
//! - [`QueueLimits`] - Count and size bounds for the queue
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stockroom_store::{QueueStore, SqliteQueueStore};
//! use stockroom_core::{NewOperation, OperationType, PendingOperation};
//!
//! async fn example() {
//!     let store = SqliteQueueStore::open("queue.db").unwrap();
//!
//!     let op = PendingOperation::create(
//!         NewOperation::new(OperationType::Delete, "/api/products/12"),
//!     )
//!     .unwrap();
//!     store.add(&op).await.unwrap();
//!
//!     for op in store.list().await.unwrap() {
//!         println!("{} {} {}", op.id, op.op_type, op.endpoint);
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent writes**: `add` upserts by id and keeps the original position
//! - **FIFO**: `list` returns records in first-insertion order
//! - **Quota**: new records past [`QueueLimits`] are refused, never evicting
//!   existing ones
//! - **Leases**: a named claim in the store lets processes sharing one
//!   database avoid draining it twice

mod clock;
pub mod error;
pub mod limits;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use limits::{QueueLimits, QueueStats};
pub use memory::MemoryQueueStore;
pub use sqlite::SqliteQueueStore;
pub use traits::{QueueStore, QueueStoreExt};
