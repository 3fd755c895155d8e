//! # Stockroom Sync
//!
//! Replays queued inventory writes once the device is back online.
//!
//! ## Overview
//!
//! The [`SyncManager`] owns the queue's lifecycle. It persists submitted
//! operations through a [`QueueStore`](stockroom_store::QueueStore), drains
//! them through an [`Executor`] in insertion order, keeps per-record retry
//! bookkeeping and announces every transition on an [`EventBus`].
//!
//! Drains are started on enqueue, by [`SyncManager::sync`], and by the
//! [`SyncScheduler`] (periodic tick and reconnect edge).
//!
//! ## Key Types
//!
//! - [`SyncManager`] - Enqueue, drain, inspect and clear
//! - [`Executor`] / [`HttpExecutor`] - Turn a record into a request
//! - [`Connectivity`] / [`ManualConnectivity`] / [`HttpProbe`] - Online signal
//! - [`SyncScheduler`] - Background triggers
//! - [`EventBus`] / [`Subscription`] - Listener registry
//!
//! ## Guarantees
//!
//! - At most one drain pass per manager at a time; with a
//!   [`LeaseConfig`], at most one per shared store
//! - A record leaves the queue only after the executor reported success
//! - A failing record never blocks the records behind it
//! - Replay is at-least-once: a crash between a successful request and the
//!   removal replays that record again

pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod executor;
pub mod http;
pub mod manager;
pub mod scheduler;
pub mod task;

pub use config::{LeaseConfig, SyncConfig};
pub use connectivity::{Connectivity, HttpProbe, ManualConnectivity};
pub use error::{ExecutorError, Result, SyncError};
pub use events::{EventBus, Subscription};
pub use executor::{default_method, plan, Executor, RequestPlan};
pub use http::{HttpExecutor, HttpExecutorConfig, HOTEL_ID_HEADER};
pub use manager::{SyncManager, SyncOutcome, SyncReport, SyncStatus};
pub use scheduler::SyncScheduler;
pub use task::BackgroundTask;
