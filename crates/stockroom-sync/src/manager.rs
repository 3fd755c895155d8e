//! The sync manager: enqueue, drain, and queue inspection.
//!
//! A drain pass snapshots the queue, replays each pending record in
//! insertion order and applies the outcome to the store before moving on:
//!
//! ```text
//!   list ──► for each pending record
//!              ├─ Ok   ──► remove            ──► operation_synced
//!              └─ Err  ──► retry_count += 1  ──► (at max) operation_failed
//! ```
//!
//! A failing record never blocks the records behind it. A store failure
//! aborts the pass; whatever was not yet applied stays queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use stockroom_core::{NewOperation, OperationId, PendingOperation, SyncEvent};
use stockroom_store::{QueueStore, QueueStoreExt};

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::events::{EventBus, Subscription};
use crate::executor::Executor;

/// Counts for one completed drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records replayed and removed.
    pub synced: usize,

    /// Failed attempts in this pass, including those that quarantined.
    pub failed: usize,

    /// Records moved to `failed` in this pass.
    pub quarantined: usize,

    /// Ids removed in this pass, in replay order.
    pub synced_ids: Vec<OperationId>,
}

/// What a call to [`SyncManager::sync`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass ran over the whole snapshot.
    Completed(SyncReport),

    /// Another pass in this process was already running.
    AlreadyRunning,

    /// The connectivity signal reported offline.
    Offline,

    /// Another process holds the drain lease.
    LeaseHeld,

    /// A store failure or a lost lease stopped the pass early.
    Aborted(String),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed(_))
    }
}

/// Observable queue state for presentation code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub pending_count: usize,
    pub failed_count: usize,
    pub is_syncing: bool,
}

/// Clears the in-process syncing flag when a pass ends, including when the
/// pass future is dropped.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the offline queue's lifecycle.
///
/// Share it as `Arc<SyncManager<..>>`: enqueue spawns background drains
/// that hold a clone.
pub struct SyncManager<S, E> {
    store: S,
    executor: E,
    connectivity: Arc<dyn Connectivity>,
    config: SyncConfig,
    events: EventBus,
    syncing: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl<S, E> SyncManager<S, E>
where
    S: QueueStore + 'static,
    E: Executor + 'static,
{
    pub fn new(
        store: S,
        executor: E,
        connectivity: Arc<dyn Connectivity>,
        config: SyncConfig,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            store,
            executor,
            connectivity,
            config,
            events: EventBus::new(),
            syncing: AtomicBool::new(false),
            status,
        }
    }

    /// Validate, persist and announce an operation.
    ///
    /// Returns once the record is durable. When online and
    /// `sync_on_enqueue` is set, a drain pass is started in the background;
    /// its result is not awaited.
    pub async fn queue_operation(self: &Arc<Self>, new: NewOperation) -> Result<OperationId> {
        let op = PendingOperation::create(new)?;

        if let Err(e) = self.store.add(&op).await {
            tracing::error!(op_type = %op.op_type, endpoint = %op.endpoint, error = %e, "failed to queue operation");
            return Err(e.into());
        }

        tracing::info!(id = %op.id, op_type = %op.op_type, endpoint = %op.endpoint, "operation queued");
        self.events
            .emit(&SyncEvent::OperationQueued { id: op.id.clone() });
        self.refresh_status().await;

        if self.config.sync_on_enqueue && self.connectivity.is_online() {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                manager.sync().await;
            });
        }

        Ok(op.id)
    }

    /// Run one drain pass.
    ///
    /// Never returns an error: every failure is reported through the
    /// outcome, the records and the event stream.
    pub async fn sync(&self) -> SyncOutcome {
        if !self.connectivity.is_online() {
            tracing::debug!("skipping drain pass: offline");
            return SyncOutcome::Offline;
        }

        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("drain pass already running");
            return SyncOutcome::AlreadyRunning;
        }
        let guard = SyncingGuard(&self.syncing);

        if let Some(lease) = &self.config.lease {
            match self
                .store
                .try_acquire_lease(&lease.name, &lease.holder, lease.ttl)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(lease = %lease.name, "drain lease held by another process");
                    return SyncOutcome::LeaseHeld;
                }
                Err(e) => return self.abort(format!("failed to acquire drain lease: {}", e)),
            }
        }

        self.status.send_modify(|s| s.is_syncing = true);
        let outcome = self.drain().await;

        if let Some(lease) = &self.config.lease {
            if let Err(e) = self.store.release_lease(&lease.name, &lease.holder).await {
                tracing::warn!(lease = %lease.name, error = %e, "failed to release drain lease");
            }
        }

        drop(guard);
        self.refresh_status().await;
        outcome
    }

    async fn drain(&self) -> SyncOutcome {
        self.events.emit(&SyncEvent::SyncStarted);

        let snapshot = match self.store.list().await {
            Ok(ops) => ops,
            Err(e) => return self.abort(format!("failed to read queue: {}", e)),
        };
        let failed_count = snapshot.iter().filter(|op| op.is_failed()).count();
        let pending: Vec<PendingOperation> =
            snapshot.into_iter().filter(PendingOperation::is_pending).collect();

        // Counts are tracked from the snapshot for the rest of the pass; the
        // store is read again once the pass ends.
        self.status.send_modify(|s| {
            s.pending_count = pending.len();
            s.failed_count = failed_count;
        });

        let mut report = SyncReport::default();
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "draining offline queue");
        }

        for op in pending {
            if let Some(lease) = &self.config.lease {
                match self
                    .store
                    .try_acquire_lease(&lease.name, &lease.holder, lease.ttl)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => return self.abort("drain lease lost to another process".into()),
                    Err(e) => return self.abort(format!("failed to renew drain lease: {}", e)),
                }
            }

            match self.executor.execute(&op).await {
                Ok(_) => {
                    if let Err(e) = self.store.remove(&op.id).await {
                        return self.abort(format!("failed to remove synced operation {}: {}", op.id, e));
                    }
                    tracing::debug!(id = %op.id, "operation synced");
                    report.synced += 1;
                    report.synced_ids.push(op.id.clone());
                    self.status
                        .send_modify(|s| s.pending_count = s.pending_count.saturating_sub(1));
                    self.events.emit(&SyncEvent::OperationSynced { id: op.id });
                }
                Err(err) => {
                    let message = err.to_string();
                    let mut updated = op;
                    let quarantined = if self.config.quarantine_client_errors && err.is_client_error() {
                        updated.quarantine(message.clone(), self.config.max_retries)
                    } else {
                        updated.record_failure(message.clone(), self.config.max_retries)
                    };

                    if let Err(e) = self.store.add(&updated).await {
                        return self.abort(format!(
                            "failed to record failure of {}: {}",
                            updated.id, e
                        ));
                    }

                    report.failed += 1;
                    if quarantined {
                        report.quarantined += 1;
                        self.status.send_modify(|s| {
                            s.pending_count = s.pending_count.saturating_sub(1);
                            s.failed_count += 1;
                        });
                        tracing::warn!(
                            id = %updated.id,
                            retry_count = updated.retry_count,
                            error = %message,
                            "operation quarantined"
                        );
                        self.events.emit(&SyncEvent::OperationFailed {
                            id: updated.id,
                            error: message,
                        });
                    } else {
                        tracing::debug!(
                            id = %updated.id,
                            retry_count = updated.retry_count,
                            error = %message,
                            "operation replay failed, will retry"
                        );
                    }
                }
            }
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            quarantined = report.quarantined,
            "drain pass completed"
        );
        self.events.emit(&SyncEvent::SyncCompleted {
            synced: report.synced,
            failed: report.failed,
        });
        SyncOutcome::Completed(report)
    }

    fn abort(&self, message: String) -> SyncOutcome {
        tracing::error!(error = %message, "drain pass aborted");
        self.events.emit(&SyncEvent::SyncError {
            message: message.clone(),
        });
        SyncOutcome::Aborted(message)
    }

    /// Number of records not yet quarantined.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.store.pending_count().await?)
    }

    /// Number of quarantined records.
    pub async fn failed_count(&self) -> Result<usize> {
        Ok(self.store.failed_count().await?)
    }

    /// All records in insertion order.
    pub async fn operations(&self) -> Result<Vec<PendingOperation>> {
        Ok(self.store.list().await?)
    }

    /// Quarantined records in insertion order.
    pub async fn failed_operations(&self) -> Result<Vec<PendingOperation>> {
        Ok(self.store.failed().await?)
    }

    /// Delete every quarantined record. Returns how many were removed.
    pub async fn clear_failed_operations(&self) -> Result<usize> {
        let mut cleared = 0;
        for op in self.store.failed().await? {
            if self.store.remove(&op.id).await? {
                cleared += 1;
            }
        }

        tracing::info!(count = cleared, "cleared failed operations");
        self.events.emit(&SyncEvent::FailedCleared { count: cleared });
        self.refresh_status().await;
        Ok(cleared)
    }

    /// Register an event listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Receiver for the observable queue state.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Recompute the observable state from the store.
    pub async fn refresh_status(&self) {
        match self.store.list().await {
            Ok(ops) => {
                let failed_count = ops.iter().filter(|op| op.is_failed()).count();
                let next = SyncStatus {
                    pending_count: ops.len() - failed_count,
                    failed_count,
                    is_syncing: self.is_syncing(),
                };
                self.status.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh queue status"),
        }
    }

    /// Whether a drain pass is running in this process.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.connectivity
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}
