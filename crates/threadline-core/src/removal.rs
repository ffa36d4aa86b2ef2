//! Removal of a tracked item.
//!
//! Removing the active item also picks where to go next: the item after it in
//! history order, else the one before it, else home. The target is computed
//! from the pre-removal list so the neighbours are still known.

use crate::history;
use crate::models::NavigationItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    Item(String),
    Home,
}

/// Where to go after removing `id`. `None` unless `id` is tracked and active.
pub fn removal_target(
    history: &[NavigationItem],
    id: &str,
    active_id: &str,
) -> Option<NavigationTarget> {
    if id != active_id {
        return None;
    }
    let index = history::position(history, id)?;
    Some(adjacent_target(history, index))
}

fn adjacent_target(history: &[NavigationItem], index: usize) -> NavigationTarget {
    history
        .get(index + 1)
        .or_else(|| index.checked_sub(1).and_then(|prev| history.get(prev)))
        .map(|item| NavigationTarget::Item(item.id.clone()))
        .unwrap_or(NavigationTarget::Home)
}
