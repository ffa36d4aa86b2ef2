//! Synchronous key-value stores backing the navigation state.
//!
//! `FileStore` keeps every key in one JSON object file and rewrites it with a
//! write-to-temp-then-rename on each mutation, so a crash mid-write never
//! leaves a half-written file behind. `MemoryStore` lives for the process and
//! serves as the session fallback.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::NavError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, NavError>;
    fn set(&self, key: &str, value: &str) -> Result<(), NavError>;
    fn remove(&self, key: &str) -> Result<(), NavError>;
}

/// Persistent store: one JSON object file.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write of the backing file
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>, NavError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|source| NavError::CorruptState {
            key: self.path.display().to_string(),
            source,
        })
    }

    /// Load the map for mutation. A corrupt file is discarded rather than
    /// blocking every future write.
    fn load_map_for_write(&self) -> Result<BTreeMap<String, String>, NavError> {
        match self.load_map() {
            Ok(map) => Ok(map),
            Err(NavError::CorruptState { key, source }) => {
                tracing::warn!("kv: discarding corrupt store file {}: {}", key, source);
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }

    fn save_map(&self, map: &BTreeMap<String, String>) -> Result<(), NavError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(map)?;
        let temp_file = self.path.with_extension("json.tmp");
        std::fs::write(&temp_file, &bytes)?;
        std::fs::rename(&temp_file, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, NavError> {
        let _guard = self.lock.lock();
        Ok(self.load_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), NavError> {
        let _guard = self.lock.lock();
        let mut map = self.load_map_for_write()?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), NavError> {
        let _guard = self.lock.lock();
        let mut map = self.load_map_for_write()?;
        if map.remove(key).is_some() {
            self.save_map(&map)?;
        }
        Ok(())
    }
}

/// Same-process store. Never fails.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, NavError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), NavError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), NavError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_roundtrip_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::new(&path);
        assert_eq!(store.get("history-v2").unwrap(), None);
        store.set("history-v2", "[]").unwrap();
        store.set("sentinel-closed", "true").unwrap();

        // A second instance stands in for a fresh process
        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("history-v2").unwrap().as_deref(), Some("[]"));
        reopened.remove("sentinel-closed").unwrap();
        assert_eq!(store.get("sentinel-closed").unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("history-v2"),
            Err(NavError::CorruptState { .. })
        ));

        // Writes recover by starting a fresh map
        store.set("history-v2", "[]").unwrap();
        assert_eq!(store.get("history-v2").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.len(), 0);
    }
}
