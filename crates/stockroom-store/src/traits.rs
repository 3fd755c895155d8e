//! QueueStore trait: the abstract interface for pending-operation persistence.
//!
//! This trait allows the sync engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stockroom_core::{OperationId, PendingOperation};

use crate::error::Result;
use crate::limits::QueueStats;

/// The QueueStore trait: async interface for pending-operation persistence.
///
/// # Design Notes
///
/// - **Idempotent writes**: `add` is an upsert keyed by `id`. Writing a record
///   that already exists replaces its contents in place and keeps its original
///   position, so retry bookkeeping never reorders the queue.
/// - **Insertion order**: `list` returns every record, pending and failed, in
///   the order the ids were first added. That order is the replay order.
/// - **Leases**: a named, time-bounded claim used to keep two processes that
///   share one store from draining it at the same time.
#[async_trait]
pub trait QueueStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a record, or replace the record with the same id.
    ///
    /// Fails with `QuotaExceeded` if a *new* record would overflow the store's
    /// limits; existing records are untouched in that case.
    async fn add(&self, op: &PendingOperation) -> Result<()>;

    /// Get a record by id.
    async fn get(&self, id: &OperationId) -> Result<Option<PendingOperation>>;

    /// All records in insertion order, regardless of status.
    async fn list(&self) -> Result<Vec<PendingOperation>>;

    /// Remove a record. Returns `false` if it was not present.
    async fn remove(&self, id: &OperationId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lease Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Try to take (or renew) the lease `name` for `holder`.
    ///
    /// Succeeds if the lease is free, expired, or already held by `holder`.
    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Release the lease `name` if `holder` owns it.
    async fn release_lease(&self, name: &str, holder: &str) -> Result<()>;
}

#[async_trait]
impl<S: QueueStore + ?Sized> QueueStore for Arc<S> {
    async fn add(&self, op: &PendingOperation) -> Result<()> {
        (**self).add(op).await
    }

    async fn get(&self, id: &OperationId) -> Result<Option<PendingOperation>> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<PendingOperation>> {
        (**self).list().await
    }

    async fn remove(&self, id: &OperationId) -> Result<bool> {
        (**self).remove(id).await
    }

    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        (**self).try_acquire_lease(name, holder, ttl).await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        (**self).release_lease(name, holder).await
    }
}

/// Extension trait for common queue queries, derived from `list`.
pub trait QueueStoreExt: QueueStore {
    /// Records still waiting for replay, in insertion order.
    fn pending(&self) -> impl std::future::Future<Output = Result<Vec<PendingOperation>>> + Send;

    /// Quarantined records, in insertion order.
    fn failed(&self) -> impl std::future::Future<Output = Result<Vec<PendingOperation>>> + Send;

    /// Number of records whose status is not `failed`.
    fn pending_count(&self) -> impl std::future::Future<Output = Result<usize>> + Send;

    /// Number of quarantined records.
    fn failed_count(&self) -> impl std::future::Future<Output = Result<usize>> + Send;

    /// Occupancy of the whole store.
    fn stats(&self) -> impl std::future::Future<Output = Result<QueueStats>> + Send;
}

impl<S: QueueStore + ?Sized> QueueStoreExt for S {
    async fn pending(&self) -> Result<Vec<PendingOperation>> {
        let mut ops = self.list().await?;
        ops.retain(|op| !op.is_failed());
        Ok(ops)
    }

    async fn failed(&self) -> Result<Vec<PendingOperation>> {
        let mut ops = self.list().await?;
        ops.retain(|op| op.is_failed());
        Ok(ops)
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self.list().await?.iter().filter(|op| !op.is_failed()).count())
    }

    async fn failed_count(&self) -> Result<usize> {
        Ok(self.list().await?.iter().filter(|op| op.is_failed()).count())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let ops = self.list().await?;
        Ok(QueueStats {
            count: ops.len(),
            bytes: ops.iter().map(PendingOperation::encoded_len).sum(),
        })
    }
}
