//! Single-slot buffer carrying one freshly created item across a hard navigation.
//!
//! The creator stashes the item right before navigating; the next page's
//! initializer claims it before reading the persisted history. The slot lives
//! in a secondary store and is cleared on claim.

use std::sync::Arc;

use super::kv::KeyValueStore;
use crate::constants::PENDING_TRANSFER_KEY;
use crate::models::NavigationItem;

#[derive(Clone)]
pub struct PendingTransfer {
    store: Arc<dyn KeyValueStore>,
}

impl PendingTransfer {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite the slot with `item`. Logs and drops the item on failure.
    pub fn stash(&self, item: &NavigationItem) {
        let payload = match serde_json::to_string(item) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("pending: failed to serialize {}: {}", item.id, e);
                return;
            }
        };
        match self.store.set(PENDING_TRANSFER_KEY, &payload) {
            Ok(()) => tracing::debug!("pending: stashed {}", item.id),
            Err(e) => tracing::warn!("pending: failed to stash {}: {}", item.id, e),
        }
    }

    /// Take the stashed item, if any, and clear the slot.
    pub fn claim(&self) -> Option<NavigationItem> {
        let raw = match self.store.get(PENDING_TRANSFER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("pending: failed to read slot: {}", e);
                return None;
            }
        };

        if let Err(e) = self.store.remove(PENDING_TRANSFER_KEY) {
            tracing::warn!("pending: failed to clear slot: {}", e);
        }

        match serde_json::from_str::<NavigationItem>(&raw) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("pending: discarding corrupt payload: {}", e);
                None
            }
        }
    }
}
