use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{KvError, KvResult};
use crate::traits::{Entries, KvStore};

/// In-memory, BTreeMap-based key-value store.
///
/// Intended for tests and embedding. Values are cloned on read and write.
pub struct InMemoryKv {
    entries: RwLock<Entries>,
}

impl InMemoryKv {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::new()),
        }
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of every entry.
    pub fn snapshot(&self) -> KvResult<Entries> {
        let map = self.entries.read().map_err(|_| KvError::LockPoisoned)?;
        Ok(map.clone())
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, keys: &[String]) -> KvResult<Entries> {
        let map = self.entries.read().map_err(|_| KvError::LockPoisoned)?;
        Ok(keys
            .iter()
            .filter_map(|k| map.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn get_all(&self) -> KvResult<Entries> {
        self.snapshot()
    }

    async fn set(&self, entries: Entries) -> KvResult<()> {
        let mut map = self.entries.write().map_err(|_| KvError::LockPoisoned)?;
        map.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> KvResult<()> {
        let mut map = self.entries.write().map_err(|_| KvError::LockPoisoned)?;
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }

    async fn clear(&self) -> KvResult<()> {
        self.entries
            .write()
            .map_err(|_| KvError::LockPoisoned)?
            .clear();
        Ok(())
    }

    async fn get_one(&self, key: &str) -> KvResult<Option<Value>> {
        let map = self.entries.read().map_err(|_| KvError::LockPoisoned)?;
        Ok(map.get(key).cloned())
    }
}

impl std::fmt::Debug for InMemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKv")
            .field("entry_count", &self.len())
            .finish()
    }
}
