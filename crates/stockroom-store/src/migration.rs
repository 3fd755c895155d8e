//! Versioned schema for the SQLite queue.
//!
//! Each entry in [`MIGRATIONS`] moves the schema one version forward. Applied
//! versions are recorded in `schema_migrations`, so opening a queue file runs
//! only the steps it has not seen yet.

use rusqlite::{params, Connection};

use crate::clock::now_millis;
use crate::error::{Result, StoreError};

/// Ordered schema steps; the index + 1 is the version they produce.
const MIGRATIONS: &[&str] = &[
    // v1: queue table and drain leases.
    r#"
    CREATE TABLE pending_operations (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order = replay order
        id TEXT NOT NULL UNIQUE,                -- OperationId
        op_type TEXT NOT NULL,                  -- CREATE, UPDATE, ...
        status TEXT NOT NULL,                   -- pending | failed
        retry_count INTEGER NOT NULL DEFAULT 0,
        record TEXT NOT NULL,                   -- full JSON record
        size INTEGER NOT NULL,                  -- byte length of record
        created_at TEXT NOT NULL,               -- RFC 3339, from the record
        updated_at INTEGER NOT NULL             -- local unix ms of last write
    );

    -- Shared by processes using the same file
    CREATE TABLE sync_leases (
        name TEXT PRIMARY KEY,
        holder TEXT NOT NULL,
        expires_at INTEGER NOT NULL             -- unix ms
    );

    CREATE INDEX idx_pending_operations_status ON pending_operations(status);
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let applied = schema_version(conn)?;
    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "queue file is at schema v{}, this build only knows v{}",
            applied, CURRENT_VERSION
        )));
    }
    if applied == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(applied as usize) {
        let version = index as u32 + 1;
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("v{} failed: {}", version, e)))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_millis()],
        )?;
        tracing::debug!(version, "applied queue schema migration");
    }
    tx.commit()?;

    Ok(())
}

/// Highest applied schema version, 0 for a fresh file.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_fresh_file_gets_queue_schema() {
        let conn = fresh();
        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('pending_operations')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|c| c.unwrap())
            .collect();

        for expected in ["seq", "id", "status", "record", "size"] {
            assert!(columns.iter().any(|c| c == expected), "missing {}", expected);
        }
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_reopening_applies_nothing_new() {
        let mut conn = fresh();
        migrate(&mut conn).unwrap();

        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_file_is_refused() {
        let mut conn = fresh();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            params![CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
