use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::traits::{Entries, KvStore};

/// Key-value store persisted as a single JSON object on disk.
///
/// The whole document is held in memory and rewritten after every mutating
/// call. Writes go to a temporary file in the same directory which is then
/// renamed over the target, so a crash leaves either the old or the new
/// document, never a torn one.
pub struct JsonFileKv {
    path: PathBuf,
    entries: RwLock<Entries>,
    /// Serialises mutate-then-persist so documents hit the disk in order.
    write_lock: Mutex<()>,
}

impl JsonFileKv {
    /// Open the store at `path`, creating an empty one if the file is absent.
    pub async fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Entries::new(),
            Ok(bytes) => parse_document(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened JSON store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> KvResult<Entries> {
        let map = self.entries.read().map_err(|_| KvError::LockPoisoned)?;
        Ok(map.clone())
    }

    /// Apply `mutate` to a copy of the map, write the copy out, and only then
    /// make it visible to readers. A failed write leaves memory untouched.
    async fn mutate_and_persist<F>(&self, mutate: F) -> KvResult<()>
    where
        F: FnOnce(&mut Entries) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.snapshot()?;
        mutate(&mut next);
        let bytes = serde_json::to_vec(&next)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| KvError::Task(e.to_string()))??;
        *self.entries.write().map_err(|_| KvError::LockPoisoned)? = next;
        debug!(path = %self.path.display(), "persisted JSON store");
        Ok(())
    }
}

fn parse_document(path: &Path, bytes: &[u8]) -> KvResult<Entries> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(KvError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("expected a JSON object at top level, found {}", type_name(&other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> KvResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| KvError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl KvStore for JsonFileKv {
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
        self.mutate_and_persist(move |map| map.extend(entries)).await
    }

    async fn remove(&self, keys: &[String]) -> KvResult<()> {
        let keys = keys.to_vec();
        self.mutate_and_persist(move |map| {
            for key in &keys {
                map.remove(key);
            }
        })
        .await
    }

    async fn clear(&self) -> KvResult<()> {
        self.mutate_and_persist(|map| map.clear()).await
    }
}

impl std::fmt::Debug for JsonFileKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileKv")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kv = JsonFileKv::open(dir.path().join("store.json")).await.unwrap();
        assert!(kv.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let kv = JsonFileKv::open(&path).await.unwrap();
            kv.set_one("0", json!({"items": [0]})).await.unwrap();
            kv.set_one("0,0,i", json!({"title": "a,b"})).await.unwrap();
            kv.remove_one("0,0,i").await.unwrap();
        }

        let kv = JsonFileKv::open(&path).await.unwrap();
        let all = kv.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["0"], json!({"items": [0]}));
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let kv = JsonFileKv::open(&path).await.unwrap();
        kv.set_one("trash", json!({"links": []})).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn clear_empties_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let kv = JsonFileKv::open(&path).await.unwrap();
        kv.set_one("a", json!(1)).await.unwrap();
        kv.clear().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim(), "{}");
    }

    #[tokio::test]
    async fn failed_persist_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let kv = JsonFileKv::open(&path).await.unwrap();
        kv.set_one("a", json!(1)).await.unwrap();

        // A non-empty directory in place of the document makes the rename fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), "x").unwrap();

        assert!(kv.set_one("b", json!(2)).await.is_err());
        assert!(kv.remove_one("a").await.is_err());
        assert_eq!(kv.get_one("b").await.unwrap(), None);
        assert_eq!(kv.get_one("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = JsonFileKv::open(&path).await.unwrap_err();
        assert!(matches!(err, KvError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileKv::open(&path).await.unwrap_err();
        assert!(matches!(err, KvError::Serialization(_)));
    }
}
