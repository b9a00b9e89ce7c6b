/*!
 * Key/value persistence for translation sessions.
 *
 * `KeyValueStore` is the storage collaborator of the pipeline: JSON documents
 * addressed by string keys. `SqliteStore` keeps them on disk, `MemoryStore`
 * keeps them for the lifetime of the process.
 */

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use super::connection::DatabaseConnection;
use crate::errors::StorageError;

/// Asynchronous get/set/remove of JSON documents by key
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Read the document stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous document
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete the document under `key`, returning whether one existed
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    /// Create a store over an open connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open (or create) the database at the default location
    pub fn new_default() -> Result<Self, StorageError> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StorageError> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Create a store over an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Number of stored documents
    pub async fn count(&self) -> Result<i64, StorageError> {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?)
            })
            .await
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let key = key.to_string();

        let raw: Option<String> = self
            .db
            .with_conn(move |conn| {
                Ok(conn
                    .query_row("SELECT value FROM kv_store WHERE key = ?1", [&key], |row| {
                        row.get(0)
                    })
                    .optional()?)
            })
            .await?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let key = key.to_string();
        let text = serde_json::to_string(&value)?;
        let now = chrono::Utc::now().to_rfc3339();

        debug!("Persisting {} bytes under '{}'", text.len(), key);

        self.db
            .with_conn(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO kv_store (key, value, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?3)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                    "#,
                    params![key, text, now],
                )?;
                Ok(())
            })
            .await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let key = key.to_string();

        self.db
            .with_conn(move |conn| {
                let removed = conn.execute("DELETE FROM kv_store WHERE key = ?1", [&key])?;
                Ok(removed > 0)
            })
            .await
    }
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.write().remove(key).is_some())
    }
}
