//! Handle for the engine's long-running background tasks.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A spawned loop that can be stopped.
///
/// The loop receives a stop signal that resolves when [`shutdown`] is called
/// or when this handle is dropped.
///
/// [`shutdown`]: BackgroundTask::shutdown
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    stop: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stop_rx) = oneshot::channel();
        let join = tokio::spawn(body(stop_rx));
        tracing::debug!(task = name, "background task started");
        Self { name, stop, join }
    }

    /// Signal the loop to stop and wait for it to finish.
    ///
    /// A drain pass in progress is allowed to complete first.
    pub async fn shutdown(self) {
        let BackgroundTask { name, stop, join } = self;
        let _ = stop.send(());
        match join.await {
            Ok(()) => tracing::debug!(task = name, "background task stopped"),
            Err(e) => tracing::warn!(task = name, error = %e, "background task ended abnormally"),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
