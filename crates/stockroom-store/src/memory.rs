//! In-memory implementation of the QueueStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use stockroom_core::{OperationId, PendingOperation};

use crate::clock::{lease_expiry, now_millis};
use crate::error::{Result, StoreError};
use crate::limits::{QueueLimits, QueueStats};
use crate::traits::QueueStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryQueueStore {
    inner: RwLock<MemoryQueueInner>,
    limits: QueueLimits,
}

struct MemoryQueueInner {
    /// Records keyed by insertion sequence.
    records: BTreeMap<u64, StoredOperation>,

    /// Id index: id -> insertion sequence.
    index: HashMap<OperationId, u64>,

    /// Next insertion sequence.
    next_seq: u64,

    /// Leases: name -> (holder, expires_at unix ms).
    leases: HashMap<String, (String, i64)>,
}

struct StoredOperation {
    op: PendingOperation,
    size: usize,
}

impl MemoryQueueStore {
    /// Create a new empty in-memory store with default limits.
    pub fn new() -> Self {
        Self::with_limits(QueueLimits::default())
    }

    /// Create a new empty in-memory store with the given limits.
    pub fn with_limits(limits: QueueLimits) -> Self {
        Self {
            inner: RwLock::new(MemoryQueueInner {
                records: BTreeMap::new(),
                index: HashMap::new(),
                next_seq: 1,
                leases: HashMap::new(),
            }),
            limits,
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryQueueInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryQueueInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn add(&self, op: &PendingOperation) -> Result<()> {
        let mut inner = self.write()?;
        let size = op.encoded_len();

        // Existing id: replace in place, keep position
        if let Some(&seq) = inner.index.get(&op.id) {
            inner.records.insert(
                seq,
                StoredOperation {
                    op: op.clone(),
                    size,
                },
            );
            return Ok(());
        }

        let stats = QueueStats {
            count: inner.records.len(),
            bytes: inner.records.values().map(|s| s.size).sum(),
        };
        self.limits.check(&stats, size)?;

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.index.insert(op.id.clone(), seq);
        inner.records.insert(
            seq,
            StoredOperation {
                op: op.clone(),
                size,
            },
        );

        Ok(())
    }

    async fn get(&self, id: &OperationId) -> Result<Option<PendingOperation>> {
        let inner = self.read()?;
        Ok(inner
            .index
            .get(id)
            .and_then(|seq| inner.records.get(seq))
            .map(|stored| stored.op.clone()))
    }

    async fn list(&self) -> Result<Vec<PendingOperation>> {
        let inner = self.read()?;
        Ok(inner.records.values().map(|s| s.op.clone()).collect())
    }

    async fn remove(&self, id: &OperationId) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.index.remove(id) {
            Some(seq) => {
                inner.records.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.write()?;
        let now = now_millis();

        if let Some((current, expires_at)) = inner.leases.get(name) {
            if current != holder && *expires_at > now {
                return Ok(false);
            }
        }

        inner.leases.insert(
            name.to_string(),
            (holder.to_string(), lease_expiry(now, ttl)),
        );
        Ok(true)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        let mut inner = self.write()?;
        if matches!(inner.leases.get(name), Some((current, _)) if current == holder) {
            inner.leases.remove(name);
        }
        Ok(())
    }
}
