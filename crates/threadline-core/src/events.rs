use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::{NavigationItem, ParentSummary};
use crate::resolver::{Location, PageHints};

/// Domain and lifecycle signals the navigation service reacts to.
#[derive(Debug, Clone)]
pub enum NavEvent {
    /// A note was created inside `parent_id`.
    EntityCreated { parent_id: String },
    /// A note was deleted from `parent_id`.
    EntityDeleted { parent_id: String },
    /// A note was moved into `parent_id`.
    EntityMovedIn { parent_id: String },
    /// A note was moved out of `parent_id`.
    EntityMovedOut { parent_id: String },
    /// A thread or space was created.
    ParentCreated(ParentSummary),
    /// A thread or space was deleted server-side.
    ParentDeleted { parent_id: String },
    /// A soft or hard navigation completed.
    PageNavigated {
        location: Location,
        hints: PageHints,
        /// Display data for the page's parent, when the page has it at hand.
        parent: Option<ParentSummary>,
    },
}

impl NavEvent {
    /// Optimistic count delta carried by note-level events.
    pub fn count_delta(&self) -> Option<(&str, i64)> {
        match self {
            NavEvent::EntityCreated { parent_id } | NavEvent::EntityMovedIn { parent_id } => {
                Some((parent_id.as_str(), 1))
            }
            NavEvent::EntityDeleted { parent_id } | NavEvent::EntityMovedOut { parent_id } => {
                Some((parent_id.as_str(), -1))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type HistoryCallback = Arc<dyn Fn(&[NavigationItem]) + Send + Sync>;

/// Registry of mounted consumers that re-render on every history change.
#[derive(Default)]
pub struct EventBridge {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, HistoryCallback)>>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: HistoryCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.lock().push((id, callback));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Invoke every subscriber with `history`.
    ///
    /// The registry lock is released before any callback runs, so callbacks
    /// may subscribe, unsubscribe or read service state.
    pub fn notify(&self, history: &[NavigationItem]) {
        let callbacks: Vec<HistoryCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(history);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_count_delta() {
        let created = NavEvent::EntityCreated { parent_id: "t1".to_string() };
        assert_eq!(created.count_delta(), Some(("t1", 1)));
        let moved_out = NavEvent::EntityMovedOut { parent_id: "t2".to_string() };
        assert_eq!(moved_out.count_delta(), Some(("t2", -1)));
        let deleted = NavEvent::ParentDeleted { parent_id: "t1".to_string() };
        assert_eq!(deleted.count_delta(), None);
    }

    #[test]
    fn test_notify_and_unsubscribe() {
        let bridge = EventBridge::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let id = bridge.subscribe(Arc::new(move |history: &[NavigationItem]| {
            counter.fetch_add(history.len() + 1, Ordering::SeqCst);
        }));

        bridge.notify(&[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(bridge.unsubscribe(id));
        assert!(!bridge.unsubscribe(id));
        bridge.notify(&[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.subscriber_count(), 0);
    }
}
