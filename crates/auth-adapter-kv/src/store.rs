// Key-value store abstraction and the in-process implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

// ─── KeyValueStore Trait ─────────────────────────────────────────

/// The store operations the adapter relies on.
///
/// `set_if_absent`, `take` and `delete_many` must each be atomic in the
/// backing store (Redis: `SET NX`, `GETDEL`, multi-key `DEL`).
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Store `value` only if `key` is unset. Returns `true` if it was stored.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Delete a key. Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete every listed key in one step. Returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Read and delete a key in one step.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Storage error: {0}")]
    Other(String),
}

// ─── In-Memory Implementation ────────────────────────────────────

/// In-process `KeyValueStore`.
///
/// Cloning shares the underlying map. Not suitable for multi-process
/// deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys starting with `prefix`, sorted.
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        Ok(keys.iter().filter(|key| entries.remove(*key).is_some()).count())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.write().await.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".into()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = MemoryKeyValueStore::new();
        assert!(store.set_if_absent("k", "first").await.unwrap());
        assert!(!store.set_if_absent("k", "second").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("first".into()));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.set("c", "3").await.unwrap();

        let keys = ["a".to_string(), "b".to_string(), "missing".to_string()];
        assert_eq!(store.delete_many(&keys).await.unwrap(), 2);
        assert_eq!(store.keys("").await, vec!["c"]);
        assert_eq!(store.delete_many(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.take("k").await.unwrap(), Some("v".into()));
        assert_eq!(store.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_and_clear() {
        let store = MemoryKeyValueStore::new();
        store.set("app:b", "2").await.unwrap();
        store.set("app:a", "1").await.unwrap();
        store.set("other", "3").await.unwrap();
        assert_eq!(store.keys("app:").await, vec!["app:a", "app:b"]);
        assert_eq!(store.len().await, 3);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
