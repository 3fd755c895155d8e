//! The Engine: a sync manager with its background triggers running.
//!
//! The Engine owns the lifecycle the host application would otherwise wire
//! by hand: it shares the [`SyncManager`], starts the [`SyncScheduler`] and,
//! when configured, an [`HttpProbe`], and stops them on shutdown.

use std::sync::Arc;

use stockroom_core::{NewOperation, OperationId, PendingOperation, SyncEvent};
use stockroom_store::{QueueStore, SqliteQueueStore};
use stockroom_sync::{
    BackgroundTask, Connectivity, Executor, HttpExecutor, HttpProbe, ManualConnectivity,
    Subscription, SyncManager, SyncOutcome, SyncScheduler, SyncStatus,
};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::Result;

/// Engine over the production backends.
pub type HttpEngine = Engine<SqliteQueueStore, HttpExecutor>;

/// A running sync engine.
pub struct Engine<S, E> {
    manager: Arc<SyncManager<S, E>>,
    scheduler: BackgroundTask,
    probe: Option<BackgroundTask>,
}

impl<S, E> Engine<S, E>
where
    S: QueueStore + 'static,
    E: Executor + 'static,
{
    /// Start the scheduler for an existing manager. Must be called from
    /// within a Tokio runtime.
    pub fn start(manager: Arc<SyncManager<S, E>>) -> Self {
        let scheduler = SyncScheduler::spawn(Arc::clone(&manager));
        Self {
            manager,
            scheduler,
            probe: None,
        }
    }

    /// Tie a connectivity probe's lifetime to the engine.
    pub fn with_probe(mut self, probe: BackgroundTask) -> Self {
        self.probe = Some(probe);
        self
    }

    /// The underlying manager.
    pub fn manager(&self) -> &Arc<SyncManager<S, E>> {
        &self.manager
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queue Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist an operation for replay.
    pub async fn queue_operation(&self, new: NewOperation) -> Result<OperationId> {
        Ok(self.manager.queue_operation(new).await?)
    }

    /// Run one drain pass now.
    pub async fn sync(&self) -> SyncOutcome {
        self.manager.sync().await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.manager.pending_count().await?)
    }

    pub async fn operations(&self) -> Result<Vec<PendingOperation>> {
        Ok(self.manager.operations().await?)
    }

    pub async fn failed_operations(&self) -> Result<Vec<PendingOperation>> {
        Ok(self.manager.failed_operations().await?)
    }

    pub async fn clear_failed_operations(&self) -> Result<usize> {
        Ok(self.manager.clear_failed_operations().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.manager.subscribe(listener)
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.manager.status()
    }

    pub fn is_syncing(&self) -> bool {
        self.manager.is_syncing()
    }

    pub fn is_online(&self) -> bool {
        self.manager.connectivity().is_online()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Stop the background tasks. A drain pass in progress completes first.
    pub async fn shutdown(self) {
        let Engine {
            manager: _,
            scheduler,
            probe,
        } = self;

        if let Some(probe) = probe {
            probe.shutdown().await;
        }
        scheduler.shutdown().await;
        tracing::info!("engine stopped");
    }
}

impl Engine<SqliteQueueStore, HttpExecutor> {
    /// Open the queue file and start the engine.
    ///
    /// With a health check configured, connectivity follows the probe;
    /// otherwise the engine assumes it is online.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let executor = HttpExecutor::new(config.http.clone())?;

        match &config.health {
            Some(health) => {
                let probe = HttpProbe::new(
                    executor.url_for(&health.path),
                    health.interval,
                    health.timeout,
                    false,
                )?;
                let connectivity: Arc<dyn Connectivity> = Arc::new(probe.signal());
                let engine = Self::open_with(config, executor, connectivity)?;
                Ok(engine.with_probe(probe.spawn()))
            }
            None => {
                let connectivity: Arc<dyn Connectivity> = Arc::new(ManualConnectivity::online());
                Self::open_with(config, executor, connectivity)
            }
        }
    }

    /// Open the queue file and start the engine with a caller-driven
    /// connectivity signal.
    pub fn open_with(
        config: EngineConfig,
        executor: HttpExecutor,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        config.validate()?;

        let store = SqliteQueueStore::open(&config.database_path)?.with_limits(config.limits);
        tracing::info!(
            path = %config.database_path.display(),
            base_url = %config.http.base_url,
            "opened offline queue"
        );

        let manager = Arc::new(SyncManager::new(store, executor, connectivity, config.sync));
        Ok(Self::start(manager))
    }
}
