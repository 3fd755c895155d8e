//! Background drain triggers.
//!
//! Besides enqueue, drains are started by two things:
//!
//! - a periodic tick, when online, idle and the queue has pending records
//! - any notification that the link is online, after a short debounce so a
//!   flapping link settles first
//!
//! Going offline cancels a pending debounced drain. The connectivity signal
//! coalesces values, so a drop and restore that happen between two polls
//! arrive as a single online notification; that still counts as a restore.

use std::sync::Arc;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use stockroom_store::QueueStore;

use crate::executor::Executor;
use crate::manager::SyncManager;
use crate::task::BackgroundTask;

/// Spawns the trigger loop for a manager.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Start the trigger loop. Must be called from within a Tokio runtime.
    pub fn spawn<S, E>(manager: Arc<SyncManager<S, E>>) -> BackgroundTask
    where
        S: QueueStore + 'static,
        E: Executor + 'static,
    {
        // Subscribe before the task runs so changes made right after spawn
        // are not folded into the initial value.
        let mut online_rx = manager.connectivity().watch();
        let mut was_online = *online_rx.borrow_and_update();

        BackgroundTask::spawn("sync-scheduler", move |mut stop| async move {
            let period = manager.config().sync_interval;
            let debounce = manager.config().reconnect_debounce;

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut signal_open = true;
            let mut reconnect_at: Option<Instant> = None;

            tracing::info!(
                interval_ms = period.as_millis() as u64,
                online = was_online,
                "sync scheduler started"
            );

            loop {
                tokio::select! {
                    _ = &mut stop => break,

                    _ = ticker.tick() => {
                        if !manager.connectivity().is_online() || manager.is_syncing() {
                            continue;
                        }
                        match manager.pending_count().await {
                            Ok(0) => {}
                            Ok(_) => {
                                manager.sync().await;
                            }
                            Err(e) => tracing::warn!(error = %e, "periodic drain check failed"),
                        }
                    }

                    changed = online_rx.changed(), if signal_open => {
                        if changed.is_err() {
                            tracing::debug!("connectivity signal closed");
                            signal_open = false;
                            continue;
                        }
                        let online = *online_rx.borrow_and_update();
                        if online {
                            tracing::info!(was_online, "connectivity restored, draining after debounce");
                            reconnect_at = Some(Instant::now() + debounce);
                        } else {
                            if was_online {
                                tracing::info!("connectivity lost");
                            }
                            reconnect_at = None;
                        }
                        was_online = online;
                    }

                    _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                        reconnect_at = None;
                        if manager.connectivity().is_online() {
                            manager.sync().await;
                        }
                    }
                }
            }

            tracing::info!("sync scheduler stopped");
        })
    }
}
