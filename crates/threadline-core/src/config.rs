use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_HOME_LOCATION, MAX_HISTORY_ITEMS, RECONCILE_DEBOUNCE_MS};

/// Default listing endpoint, relative to a locally running backend.
const DEFAULT_LISTING_URL: &str = "http://localhost:3000/api/threads";

/// Request timeout applied by the HTTP listing client.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    /// Endpoint returning every parent visible to the current user with its true count.
    pub listing_url: String,
    pub max_history: usize,
    pub reconcile_debounce: Duration,
    /// Hard-navigation target when a removed active item has no neighbour.
    pub home_location: String,
    pub request_timeout: Duration,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            max_history: MAX_HISTORY_ITEMS,
            reconcile_debounce: Duration::from_millis(RECONCILE_DEBOUNCE_MS),
            home_location: DEFAULT_HOME_LOCATION.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Build a config from `THREADLINE_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::new(default_data_dir());

        if let Ok(url) = std::env::var("THREADLINE_LISTING_URL") {
            if !url.trim().is_empty() {
                config = config.with_listing_url(url);
            }
        }

        if let Ok(location) = std::env::var("THREADLINE_HOME_LOCATION") {
            if !location.trim().is_empty() {
                config = config.with_home_location(location);
            }
        }

        if let Ok(raw) = std::env::var("THREADLINE_RECONCILE_DEBOUNCE_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => config.reconcile_debounce = Duration::from_millis(ms),
                Err(e) => tracing::warn!(
                    "Ignoring THREADLINE_RECONCILE_DEBOUNCE_MS={:?}: {}",
                    raw,
                    e
                ),
            }
        }

        config
    }

    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    pub fn with_reconcile_debounce(mut self, debounce: Duration) -> Self {
        self.reconcile_debounce = debounce;
        self
    }

    pub fn with_home_location(mut self, location: impl Into<String>) -> Self {
        self.home_location = location.into();
        self
    }

    /// File backing the persistent key-value store.
    pub fn primary_store_path(&self) -> PathBuf {
        self.data_dir.join("navigation_state.json")
    }

    /// File backing the secondary (pending-transfer) store.
    pub fn session_store_path(&self) -> PathBuf {
        self.data_dir.join("session_state.json")
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new("threadline_data")
    }
}

/// Data directory: `THREADLINE_BASE_DIR` if set, otherwise the platform data dir.
pub fn default_data_dir() -> PathBuf {
    if let Ok(base_dir) = std::env::var("THREADLINE_BASE_DIR") {
        return PathBuf::from(base_dir);
    }
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("threadline")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let config = CoreConfig::new("/tmp/threadline-test");
        assert_eq!(config.max_history, MAX_HISTORY_ITEMS);
        assert_eq!(config.reconcile_debounce, Duration::from_millis(300));
        assert_eq!(config.home_location, "/");
        assert_eq!(
            config.primary_store_path(),
            PathBuf::from("/tmp/threadline-test/navigation_state.json")
        );
    }

    #[test]
    fn test_max_history_never_zero() {
        let config = CoreConfig::default().with_max_history(0);
        assert_eq!(config.max_history, 1);
    }
}
