//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use stockroom_store::QueueLimits;
use stockroom_sync::{HttpExecutorConfig, LeaseConfig, SyncConfig};

use crate::error::{EngineError, Result};

/// Health endpoint polling, used to derive connectivity.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Path (joined with the base URL) or absolute URL.
    pub path: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl HealthCheckConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for [`Engine::open`](crate::Engine::open).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite queue file.
    pub database_path: PathBuf,
    /// Queue bounds.
    pub limits: QueueLimits,
    /// Replay target.
    pub http: HttpExecutorConfig,
    /// Retry, trigger and lease settings.
    pub sync: SyncConfig,
    /// Connectivity probe. Without one the engine assumes it is online.
    pub health: Option<HealthCheckConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("stockroom.db"),
            limits: QueueLimits::default(),
            http: HttpExecutorConfig::default(),
            sync: SyncConfig::default(),
            health: None,
        }
    }
}

impl EngineConfig {
    pub fn new(database_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            http: HttpExecutorConfig::new(base_url),
            ..Default::default()
        }
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.http.bearer_token = Some(token.into());
        self
    }

    pub fn limits(mut self, limits: QueueLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn health_check(mut self, health: HealthCheckConfig) -> Self {
        self.health = Some(health);
        self
    }

    /// Coordinate draining with other processes using the same file.
    pub fn shared(mut self) -> Self {
        self.sync.lease = Some(LeaseConfig::for_process());
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sync.max_retries == 0 {
            return Err(EngineError::Config("max_retries must be at least 1".into()));
        }
        if self.sync.sync_interval.is_zero() {
            return Err(EngineError::Config("sync_interval must be non-zero".into()));
        }
        if self.http.base_url.trim().is_empty() {
            return Err(EngineError::Config("base_url must not be empty".into()));
        }
        if let Some(health) = &self.health {
            if health.interval.is_zero() {
                return Err(EngineError::Config(
                    "health check interval must be non-zero".into(),
                ));
            }
        }
        if let Some(lease) = &self.sync.lease {
            if lease.ttl <= self.http.timeout {
                return Err(EngineError::Config(format!(
                    "lease ttl ({:?}) must exceed the request timeout ({:?})",
                    lease.ttl, self.http.timeout
                )));
            }
        }
        Ok(())
    }
}
