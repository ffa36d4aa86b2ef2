//! Application-wide constants
//!
//! Centralized location for storage keys, well-known ids and tuning values
//! that are used across multiple modules.

// Persisted storage keys
/// Primary-store key holding the JSON array of tracked items.
pub const HISTORY_KEY: &str = "history-v2";
/// Primary-store key holding `"true"` while the unsorted thread is closed.
pub const SENTINEL_CLOSED_KEY: &str = "sentinel-closed";
/// Secondary-store key carrying one item across a hard navigation.
pub const PENDING_TRANSFER_KEY: &str = "pending-transfer";
/// Key written and deleted by the storage integrity probe.
pub const STORAGE_PROBE_KEY: &str = "__threadline_probe__";

// Well-known ids
/// Default parent for notes not organized into any thread.
pub const UNSORTED_THREAD_ID: &str = "unsorted";
/// Pseudo-entity listed by the backend that must never be tracked.
pub const DASHBOARD_ID: &str = "dashboard";

// Item defaults
pub const DEFAULT_ITEM_TITLE: &str = "Untitled";

/// Maximum number of tracked items.
pub const MAX_HISTORY_ITEMS: usize = 10;

/// Debounce window between the last optimistic adjustment and the
/// authoritative count fetch.
pub const RECONCILE_DEBOUNCE_MS: u64 = 300;

/// Where a hard navigation goes when there is no adjacent item.
pub const DEFAULT_HOME_LOCATION: &str = "/";

/// First path segments that never denote a thread, space or note.
pub const NON_ENTITY_ROUTES: &[&str] = &[
    "",
    "home",
    "dashboard",
    "login",
    "signup",
    "logout",
    "auth",
    "settings",
    "reset-password",
];

// Active-item resolver retry policy for late-published page hints
pub const RESOLVE_MAX_RETRIES: u32 = 3;
pub const RESOLVE_RETRY_BASE_DELAY_MS: u64 = 50;
