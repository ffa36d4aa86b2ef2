//! Storage adapter for the navigation history.
//!
//! At construction the primary store gets a real write/read/delete round trip.
//! If that fails, the session fallback is used for the rest of the process.
//! Reads never fail: missing data is an empty history, corrupt data is logged
//! and treated as empty, and backend errors fall back to the in-memory mirror
//! of the last successful write.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::kv::KeyValueStore;
use crate::constants::{HISTORY_KEY, SENTINEL_CLOSED_KEY, STORAGE_PROBE_KEY};
use crate::error::NavError;
use crate::history::{self, NavigationHistory};
use crate::models::NavigationItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Primary,
    Fallback,
}

pub struct HistoryStorage {
    store: Arc<dyn KeyValueStore>,
    backend: StorageBackend,
    max_history: usize,
    mirror: Mutex<Option<NavigationHistory>>,
    sentinel_mirror: Mutex<Option<bool>>,
}

impl HistoryStorage {
    pub fn new(
        primary: Arc<dyn KeyValueStore>,
        fallback: Arc<dyn KeyValueStore>,
        max_history: usize,
    ) -> Self {
        let (store, backend) = match probe(primary.as_ref()) {
            Ok(()) => (primary, StorageBackend::Primary),
            Err(e) => {
                let err = NavError::StorageUnavailable {
                    message: e.to_string(),
                };
                tracing::warn!("history_storage: {}, using session fallback", err);
                (fallback, StorageBackend::Fallback)
            }
        };

        Self {
            store,
            backend,
            max_history,
            mirror: Mutex::new(None),
            sentinel_mirror: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// Load the persisted history. Never fails.
    pub fn read(&self) -> NavigationHistory {
        match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => match parse_history(&raw) {
                Ok(items) if history::is_normalized(&items, self.max_history) => items,
                Ok(items) => {
                    tracing::debug!("history_storage: repairing {} stored items", items.len());
                    history::normalize(items, self.max_history)
                }
                Err(e) => {
                    tracing::warn!("history_storage: {}, resetting to empty history", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("history_storage: read failed ({}), serving in-memory mirror", e);
                self.mirror.lock().clone().unwrap_or_default()
            }
        }
    }

    /// Persist `history` synchronously, then read it back to verify.
    /// Failures are logged; the in-memory value stays authoritative.
    pub fn write(&self, history: &[NavigationItem]) {
        *self.mirror.lock() = Some(history.to_vec());

        let serialized = match serde_json::to_string(history) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("history_storage: failed to serialize history: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(HISTORY_KEY, &serialized) {
            tracing::warn!("history_storage: write failed: {}", e);
            return;
        }

        match self.store.get(HISTORY_KEY) {
            Ok(Some(stored)) if stored == serialized => {}
            Ok(_) => tracing::warn!(
                "history_storage: verification read mismatch after write ({} items)",
                history.len()
            ),
            Err(e) => tracing::warn!("history_storage: verification read failed: {}", e),
        }
    }

    pub fn sentinel_closed(&self) -> bool {
        match self.store.get(SENTINEL_CLOSED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                tracing::warn!("history_storage: sentinel flag read failed: {}", e);
                self.sentinel_mirror.lock().unwrap_or(false)
            }
        }
    }

    pub fn set_sentinel_closed(&self, closed: bool) {
        *self.sentinel_mirror.lock() = Some(closed);

        let result = if closed {
            self.store.set(SENTINEL_CLOSED_KEY, "true")
        } else {
            self.store.remove(SENTINEL_CLOSED_KEY)
        };
        if let Err(e) = result {
            tracing::warn!("history_storage: failed to persist sentinel flag: {}", e);
        }
    }
}

fn parse_history(raw: &str) -> Result<NavigationHistory, NavError> {
    serde_json::from_str(raw).map_err(|source| NavError::CorruptState {
        key: HISTORY_KEY.to_string(),
        source,
    })
}

/// Write, read back and delete a probe value.
fn probe(store: &dyn KeyValueStore) -> Result<(), NavError> {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().to_string())
        .unwrap_or_else(|_| "0".to_string());

    store.set(STORAGE_PROBE_KEY, &nonce)?;
    let read_back = store.get(STORAGE_PROBE_KEY)?;
    store.remove(STORAGE_PROBE_KEY)?;

    if read_back.as_deref() != Some(nonce.as_str()) {
        return Err(NavError::StorageUnavailable {
            message: "probe value did not round-trip".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_HISTORY_ITEMS;
    use crate::store::kv::{FileStore, MemoryStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    /// Store whose operations fail while `broken` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        broken: AtomicBool,
    }

    impl FlakyStore {
        fn broken() -> Self {
            let store = Self::default();
            store.broken.store(true, Ordering::SeqCst);
            store
        }

        fn check(&self) -> Result<(), NavError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(NavError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "quota exceeded",
                )));
            }
            Ok(())
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, NavError> {
            self.check()?;
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), NavError> {
            self.check()?;
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), NavError> {
            self.check()?;
            self.inner.remove(key)
        }
    }

    fn item(id: &str, first_accessed: i64) -> NavigationItem {
        NavigationItem {
            id: id.to_string(),
            title: id.to_uppercase(),
            count: 1,
            background_gradient: Some("g1".to_string()),
            first_accessed,
            last_accessed: first_accessed + 5,
        }
    }

    #[test]
    fn test_roundtrip_on_primary() {
        let dir = tempdir().unwrap();
        let primary = Arc::new(FileStore::new(dir.path().join("state.json")));
        let storage = HistoryStorage::new(primary.clone(), Arc::new(MemoryStore::new()), MAX_HISTORY_ITEMS);
        assert_eq!(storage.backend(), StorageBackend::Primary);

        let history = vec![item("t1", 100), item("t2", 200)];
        storage.write(&history);
        assert_eq!(storage.read(), history);

        // Probe key is cleaned up
        assert_eq!(primary.get(STORAGE_PROBE_KEY).unwrap(), None);
    }

    #[test]
    fn test_failed_probe_uses_fallback() {
        let fallback = Arc::new(MemoryStore::new());
        let storage = HistoryStorage::new(Arc::new(FlakyStore::broken()), fallback.clone(), MAX_HISTORY_ITEMS);
        assert_eq!(storage.backend(), StorageBackend::Fallback);

        storage.write(&[item("t1", 100)]);
        assert!(fallback.get(HISTORY_KEY).unwrap().is_some());
        assert_eq!(storage.read().len(), 1);
    }

    #[test]
    fn test_corrupt_json_reads_empty() {
        let primary = Arc::new(MemoryStore::new());
        primary.set(HISTORY_KEY, "[{\"id\": oops").unwrap();
        let storage = HistoryStorage::new(primary, Arc::new(MemoryStore::new()), MAX_HISTORY_ITEMS);
        assert!(storage.read().is_empty());
    }

    #[test]
    fn test_read_repairs_unsorted_duplicates() {
        let primary = Arc::new(MemoryStore::new());
        let raw = serde_json::to_string(&vec![item("t2", 200), item("t1", 100), item("t2", 50)]).unwrap();
        primary.set(HISTORY_KEY, &raw).unwrap();

        let storage = HistoryStorage::new(primary, Arc::new(MemoryStore::new()), MAX_HISTORY_ITEMS);
        let ids: Vec<String> = storage.read().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn test_backend_failure_after_probe_serves_mirror() {
        let primary = Arc::new(FlakyStore::default());
        let storage = HistoryStorage::new(primary.clone(), Arc::new(MemoryStore::new()), MAX_HISTORY_ITEMS);
        assert_eq!(storage.backend(), StorageBackend::Primary);

        primary.broken.store(true, Ordering::SeqCst);
        storage.write(&[item("t1", 100)]);
        assert_eq!(storage.read(), vec![item("t1", 100)]);

        storage.set_sentinel_closed(true);
        assert!(storage.sentinel_closed());
    }

    /// Hands back the stored history re-encoded, so it never matches the
    /// written text byte for byte.
    #[derive(Default)]
    struct ReencodingStore {
        inner: MemoryStore,
    }

    impl KeyValueStore for ReencodingStore {
        fn get(&self, key: &str) -> Result<Option<String>, NavError> {
            let value = self.inner.get(key)?;
            if key != HISTORY_KEY {
                return Ok(value);
            }
            Ok(value.map(|raw| {
                let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
                serde_json::to_string_pretty(&parsed).unwrap()
            }))
        }
        fn set(&self, key: &str, value: &str) -> Result<(), NavError> {
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), NavError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_verification_mismatch_is_tolerated() {
        let storage = HistoryStorage::new(
            Arc::new(ReencodingStore::default()),
            Arc::new(MemoryStore::new()),
            MAX_HISTORY_ITEMS,
        );
        assert_eq!(storage.backend(), StorageBackend::Primary);

        let history = vec![item("t1", 100), item("t2", 200)];
        storage.write(&history);
        assert_eq!(storage.read(), history);
    }

    #[test]
    fn test_sentinel_flag() {
        let primary = Arc::new(MemoryStore::new());
        let storage = HistoryStorage::new(primary.clone(), Arc::new(MemoryStore::new()), MAX_HISTORY_ITEMS);
        assert!(!storage.sentinel_closed());

        storage.set_sentinel_closed(true);
        assert_eq!(primary.get(SENTINEL_CLOSED_KEY).unwrap().as_deref(), Some("true"));

        storage.set_sentinel_closed(false);
        assert_eq!(primary.get(SENTINEL_CLOSED_KEY).unwrap(), None);
        assert!(!storage.sentinel_closed());
    }
}
