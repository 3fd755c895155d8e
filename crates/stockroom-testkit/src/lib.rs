//! # Stockroom Testkit
//!
//! Testing utilities for the Stockroom sync engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a scriptable executor, a store with switchable faults and
//!   a harness that wires them to a [`SyncManager`](stockroom_sync::SyncManager)
//! - **Generators**: Proptest strategies for operations and their parts
//!
//! ## Test Harness
//!
//! ```rust
//! use stockroom_core::{NewOperation, OperationType};
//! use stockroom_testkit::{Reply, TestHarness};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let harness = TestHarness::new();
//! harness.executor.always("/api/products/1", Reply::Status(503));
//!
//! harness
//!     .manager
//!     .queue_operation(NewOperation::new(OperationType::Delete, "/api/products/1"))
//!     .await
//!     .unwrap();
//! harness.manager.sync().await;
//!
//! assert_eq!(harness.manager.operations().await.unwrap()[0].retry_count, 1);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use stockroom_testkit::generators::new_operation;
//!
//! proptest! {
//!     #[test]
//!     fn operations_validate(op in new_operation()) {
//!         prop_assert!(op.validate().is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{FlakyStore, HarnessManager, Reply, ScriptedExecutor, TestHarness};
pub use generators::{known_operation, new_operation};
