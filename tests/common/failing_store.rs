/*!
 * Key/value store whose every operation fails
 */

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use dualsub::database::KeyValueStore;
use dualsub::errors::StorageError;

/// Store that rejects all reads and writes, counting the attempts
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations tried against the store
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self, op: &str) -> Result<T, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Task(format!("simulated {} failure", op)))
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>, StorageError> {
        self.fail("get")
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<(), StorageError> {
        self.fail("set")
    }

    async fn remove(&self, _key: &str) -> Result<bool, StorageError> {
        self.fail("remove")
    }
}
