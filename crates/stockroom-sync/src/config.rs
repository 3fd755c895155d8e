//! Sync manager configuration.

use std::time::Duration;

use rand::RngCore;

use stockroom_core::DEFAULT_MAX_RETRIES;

/// Configuration for a [`SyncManager`](crate::SyncManager).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Failed attempts before a record is quarantined.
    pub max_retries: u32,

    /// Period of the background drain tick.
    pub sync_interval: Duration,

    /// Delay between the offline to online edge and the drain it triggers.
    pub reconnect_debounce: Duration,

    /// Start a background drain right after a successful enqueue while
    /// online.
    pub sync_on_enqueue: bool,

    /// Quarantine records on their first client error (4xx other than 408
    /// and 429, unknown type, bad method) instead of spending retries.
    pub quarantine_client_errors: bool,

    /// Cross-process drain lease. `None` relies on the in-process flag
    /// alone.
    pub lease: Option<LeaseConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            sync_interval: Duration::from_secs(30),
            reconnect_debounce: Duration::from_secs(1),
            sync_on_enqueue: true,
            quarantine_client_errors: false,
            lease: None,
        }
    }
}

/// Named lease held in the store for the duration of a drain pass.
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    pub name: String,

    /// Identity of this process; must differ between processes sharing a
    /// store.
    pub holder: String,

    /// Lease lifetime. Renewed before every replay, so it only needs to
    /// cover a single request.
    pub ttl: Duration,
}

impl LeaseConfig {
    /// Lease named `drain` with a holder unique to this process.
    pub fn for_process() -> Self {
        let mut nonce = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut nonce);

        Self {
            name: "drain".into(),
            holder: format!("{}-{}", std::process::id(), hex::encode(nonce)),
            ttl: Duration::from_secs(120),
        }
    }
}
