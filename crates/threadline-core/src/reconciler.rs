//! Authoritative count reconciliation.
//!
//! A pass fetches the canonical listing and turns it into a diff against the
//! history that is current *when the response arrives*. The diff is applied
//! through the service's single mutation entrypoint. Bursts of optimistic
//! adjustments are collapsed by [`Debouncer`] into one fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{NavigationItem, ParentSummary};

/// Canonical counts that differ from the local ones, keyed by tracked id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileDiff {
    pub counts: Vec<(String, u32)>,
}

impl ReconcileDiff {
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Compare `history` against the canonical listing.
///
/// Items with no canonical match (spaces, or anything the endpoint does not
/// enumerate) are left out of the diff and keep their local count.
pub fn reconcile_diff(history: &[NavigationItem], canonical: &[ParentSummary]) -> ReconcileDiff {
    let by_id: HashMap<&str, u32> = canonical
        .iter()
        .map(|parent| (parent.id.as_str(), parent.count))
        .collect();

    let counts = history
        .iter()
        .filter_map(|item| {
            let count = *by_id.get(item.id.as_str())?;
            (count != item.count).then(|| (item.id.clone(), count))
        })
        .collect();

    ReconcileDiff { counts }
}

/// Trailing-edge debounce: only the last `schedule` within `window` fires.
#[derive(Clone)]
pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `task` once `window` has elapsed without another call to `schedule`.
    /// Outside a tokio runtime the task is dropped with a warning.
    pub fn schedule<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!("reconciler: no async runtime, skipping scheduled pass");
            return;
        }

        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if generation.load(Ordering::SeqCst) != ticket {
                // Superseded by a later schedule
                return;
            }
            task().await;
        });
    }
}
