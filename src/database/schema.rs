/*!
 * Schema migrations for the session store.
 *
 * Migrations are applied in order inside one transaction and the reached
 * version is recorded in SQLite's `user_version` pragma.
 */

use log::{debug, info};
use rusqlite::Connection;

use crate::errors::StorageError;

/// Ordered migrations; entry `n` upgrades the database to version `n + 1`
const MIGRATIONS: &[&str] = &[
    // v1: JSON documents keyed by namespaced session key
    r#"
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_kv_store_updated ON kv_store(updated_at);
    "#,
];

/// Version a fully migrated database reports
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Bring the database up to the latest schema
pub fn migrate(conn: &mut Connection) -> Result<(), StorageError> {
    let current = user_version(conn)?;
    let target = latest_version();

    if current >= target {
        debug!("Session store schema is current (v{})", current);
        return Ok(());
    }

    info!("Migrating session store schema v{} -> v{}", current, target);

    let tx = conn.transaction()?;
    for sql in &MIGRATIONS[current as usize..] {
        tx.execute_batch(sql)?;
    }
    tx.pragma_update(None, "user_version", target)?;
    tx.commit()?;

    Ok(())
}

fn user_version(conn: &Connection) -> Result<u32, StorageError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
