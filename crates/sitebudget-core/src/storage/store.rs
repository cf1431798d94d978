//! Asynchronous key-value store contract and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;

/// Persistent key-value store holding JSON-encoded top-level records.
///
/// Both calls may fail; callers in the tracker treat a failure as
/// "skip this cycle" and retry on the next tick or focus event.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write every `(key, value)` pair.
    async fn set(&self, entries: Vec<(String, String)>) -> Result<(), StorageError>;
}

/// Process-local store, used by tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a raw value, bypassing the trait.
    #[cfg(test)]
    pub(crate) async fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, entries: Vec<(String, String)>) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().await;
        guard.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store
            .set(vec![("k".into(), "v".into()), ("j".into(), "w".into())])
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.raw("j").await.as_deref(), Some("w"));
    }
}
