use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::KvResult;

/// A batch of key/value pairs, ordered by key.
pub type Entries = BTreeMap<String, Value>;

/// Flat asynchronous key-value store.
///
/// This is the only persistence the start-page store relies on. Backends
/// must satisfy these rules:
/// - Lookups are by exact key; `get` silently omits keys that are absent.
/// - `set` and `remove` apply their whole batch or fail; there are no
///   transactions spanning separate calls.
/// - Removing an absent key is not an error.
/// - The store never interprets values.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[String]) -> KvResult<Entries>;

    /// Read every entry in the store.
    async fn get_all(&self) -> KvResult<Entries>;

    /// Insert or overwrite every entry in the batch.
    async fn set(&self, entries: Entries) -> KvResult<()>;

    /// Remove the given keys.
    async fn remove(&self, keys: &[String]) -> KvResult<()>;

    /// Remove everything.
    async fn clear(&self) -> KvResult<()>;

    /// Read a single key.
    async fn get_one(&self, key: &str) -> KvResult<Option<Value>> {
        let mut found = self.get(&[key.to_string()]).await?;
        Ok(found.remove(key))
    }

    /// Write a single key.
    async fn set_one(&self, key: &str, value: Value) -> KvResult<()> {
        let mut entries = Entries::new();
        entries.insert(key.to_string(), value);
        self.set(entries).await
    }

    /// Remove a single key.
    async fn remove_one(&self, key: &str) -> KvResult<()> {
        self.remove(&[key.to_string()]).await
    }

    /// Whether a key is present.
    async fn contains(&self, key: &str) -> KvResult<bool> {
        Ok(self.get_one(key).await?.is_some())
    }
}
