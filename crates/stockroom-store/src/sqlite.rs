//! SQLite implementation of the QueueStore trait.
//!
//! This is the primary storage backend for the offline queue. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use stockroom_core::{OperationId, PendingOperation};

use crate::error::{Result, StoreError};
use crate::limits::{QueueLimits, QueueStats};
use crate::clock::{lease_expiry, now_millis};
use crate::migration;
use crate::traits::QueueStore;

/// How long a writer waits for another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteQueueStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    limits: QueueLimits,
}

impl SqliteQueueStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and its parent directory) and runs migrations if it
    /// doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            limits: QueueLimits::default(),
        })
    }

    /// Replace the queue limits.
    pub fn with_limits(mut self, limits: QueueLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))
}

fn decode(record: &str) -> Result<PendingOperation> {
    Ok(serde_json::from_str(record)?)
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn add(&self, op: &PendingOperation) -> Result<()> {
        let record = serde_json::to_string(op)?;
        let op = op.clone();
        let limits = self.limits;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM pending_operations WHERE id = ?1",
                    params![op.id.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if !exists {
                let (count, bytes): (i64, i64) = tx.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM pending_operations",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                let stats = QueueStats {
                    count: count as usize,
                    bytes: bytes as usize,
                };
                limits.check(&stats, record.len())?;
            }

            // Upsert keeps the original seq, so position never changes.
            tx.execute(
                "INSERT INTO pending_operations (
                    id, op_type, status, retry_count, record, size, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    retry_count = excluded.retry_count,
                    record = excluded.record,
                    size = excluded.size,
                    updated_at = excluded.updated_at",
                params![
                    op.id.as_str(),
                    op.op_type.as_str(),
                    op.status.as_str(),
                    op.retry_count as i64,
                    record,
                    record.len() as i64,
                    op.timestamp,
                    now_millis(),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &OperationId) -> Result<Option<PendingOperation>> {
        let id = id.clone();

        self.run(move |conn| {
            let record: Option<String> = conn
                .query_row(
                    "SELECT record FROM pending_operations WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            record.as_deref().map(decode).transpose()
        })
        .await
    }

    async fn list(&self) -> Result<Vec<PendingOperation>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, record FROM pending_operations ORDER BY seq")?;

            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // A row that no longer decodes stays on disk but is left out, so
            // it cannot stall every other record.
            Ok(rows
                .iter()
                .filter_map(|(id, record)| match decode(record) {
                    Ok(op) => Some(op),
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "skipping undecodable queue record");
                        None
                    }
                })
                .collect())
        })
        .await
    }

    async fn remove(&self, id: &OperationId) -> Result<bool> {
        let id = id.clone();

        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM pending_operations WHERE id = ?1",
                params![id.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let name = name.to_string();
        let holder = holder.to_string();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = now_millis();

            let current: Option<(String, i64)> = tx
                .query_row(
                    "SELECT holder, expires_at FROM sync_leases WHERE name = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            if let Some((current_holder, expires_at)) = current {
                if current_holder != holder && expires_at > now {
                    return Ok(false);
                }
            }

            tx.execute(
                "INSERT INTO sync_leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    holder = excluded.holder,
                    expires_at = excluded.expires_at",
                params![name, holder, lease_expiry(now, ttl)],
            )?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        let name = name.to_string();
        let holder = holder.to_string();

        self.run(move |conn| {
            conn.execute(
                "DELETE FROM sync_leases WHERE name = ?1 AND holder = ?2",
                params![name, holder],
            )?;
            Ok(())
        })
        .await
    }
}
