//! Connectivity signal.
//!
//! The engine does not detect the network itself. It reads a boolean
//! "online" signal that is either driven by the host application
//! ([`ManualConnectivity`]) or by polling a health endpoint ([`HttpProbe`]).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::ExecutorError;
use crate::task::BackgroundTask;

/// Source of the online/offline signal.
pub trait Connectivity: Send + Sync {
    /// Current state.
    fn is_online(&self) -> bool;

    /// Receiver notified on every change of state.
    fn watch(&self) -> watch::Receiver<bool>;
}

impl<C: Connectivity + ?Sized> Connectivity for Arc<C> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        (**self).watch()
    }
}

/// Connectivity flag set by the host.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct ManualConnectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Set the state. Returns `true` if it changed; watchers are only woken
    /// on a change.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }
}

impl Connectivity for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Derives connectivity from a periodically polled health URL.
///
/// Any response below 500 counts as online; transport errors, timeouts and
/// 5xx count as offline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    signal: ManualConnectivity,
}

impl HttpProbe {
    /// Create a probe. The signal starts as `initial` until the first check.
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
        initial: bool,
    ) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            interval,
            signal: ManualConnectivity::new(initial),
        })
    }

    /// The signal this probe drives.
    pub fn signal(&self) -> ManualConnectivity {
        self.signal.clone()
    }

    /// Poll the health URL once and update the signal.
    pub async fn check(&self) -> bool {
        let online = match self.client.get(&self.url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                tracing::trace!(url = %self.url, error = %e, "health check failed");
                false
            }
        };

        if self.signal.set_online(online) {
            tracing::info!(online, url = %self.url, "connectivity changed");
        }
        online
    }

    /// Poll on the configured interval until stopped.
    pub fn spawn(self) -> BackgroundTask {
        BackgroundTask::spawn("connectivity-probe", move |mut stop| async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        self.check().await;
                    }
                }
            }
        })
    }
}

impl Connectivity for HttpProbe {
    fn is_online(&self) -> bool {
        self.signal.is_online()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.signal.watch()
    }
}
