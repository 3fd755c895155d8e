//! # Stockroom
//!
//! Offline-first write queue for inventory clients.
//!
//! ## Overview
//!
//! While the device is offline, writes to the inventory backend (creating a
//! product, collecting laundry, writing off stock) are captured as pending
//! operations in a durable queue. Once connectivity returns they are replayed
//! in the order they were made. Each record gets a bounded number of replay
//! attempts before it is quarantined for a person to review.
//!
//! ## Key Concepts
//!
//! - **Pending operation**: a captured write, persisted until it replays
//! - **Drain pass**: one sweep over the queue, attempting each pending record
//!   exactly once
//! - **Quarantine**: a record that exhausted its retries; kept, never retried
//!   automatically, cleared explicitly
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stockroom::{Engine, EngineConfig, HealthCheckConfig};
//! use stockroom::core::{NewOperation, OperationType};
//! use serde_json::json;
//!
//! async fn example() {
//!     let config = EngineConfig::new("queue.db", "https://inventory.example.com")
//!         .bearer_token("token")
//!         .health_check(HealthCheckConfig::new("/health"));
//!
//!     let engine = Engine::open(config).await.unwrap();
//!
//!     let _sub = engine.subscribe(|event| println!("{}", event.name()));
//!
//!     engine
//!         .queue_operation(
//!             NewOperation::new(OperationType::WriteOff, "/api/minibar/12/write-off")
//!                 .data(json!({"quantity": 2}))
//!                 .hotel_id("h-1"),
//!         )
//!         .await
//!         .unwrap();
//!
//!     engine.shutdown().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `stockroom::core` - Operation records, ids and events
//! - `stockroom::store` - Queue storage abstraction and SQLite
//! - `stockroom::sync` - Sync manager, executor and triggers

pub mod config;
pub mod engine;
pub mod error;

// Re-export component crates
pub use stockroom_core as core;
pub use stockroom_store as store;
pub use stockroom_sync as sync;

// Re-export main types for convenience
pub use config::{EngineConfig, HealthCheckConfig};
pub use engine::{Engine, HttpEngine};
pub use error::{EngineError, Result};

pub use stockroom_core::{NewOperation, OperationId, OperationType, PendingOperation, SyncEvent};
pub use stockroom_store::QueueLimits;
pub use stockroom_sync::{SyncConfig, SyncOutcome, SyncReport, SyncStatus};
