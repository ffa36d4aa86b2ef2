//! Failure taxonomy for the navigation subsystem.
//!
//! None of these cross the public `NavigationService` boundary: each one is
//! logged where it happens and degrades to a safe default (empty history,
//! sentinel id, or leaving state as-is).

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// Primary store failed its integrity probe; the fallback store is in use.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String },

    /// Persisted JSON could not be parsed; history resets to empty.
    #[error("Corrupt state under key {key}: {source}")]
    CorruptState {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Authoritative count fetch failed; optimistic values are kept.
    #[error("Reconcile failed: {message}")]
    ReconcileFailure { message: String },

    /// Leaf resolution exhausted every hint and fell back to the sentinel.
    #[error("Could not resolve parent for leaf {leaf_id}")]
    ResolveAmbiguous { leaf_id: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl NavError {
    pub fn reconcile(err: impl std::fmt::Display) -> Self {
        NavError::ReconcileFailure {
            message: err.to_string(),
        }
    }
}
