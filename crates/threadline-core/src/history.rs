//! Pure operations over the navigation history.
//!
//! Every function borrows the current list and returns a new one, so callers
//! can compare old and new to decide whether anything needs persisting or
//! announcing. Every write path ends in [`normalize`]:
//! - unique ids (on conflict the entry with the greatest `last_accessed` wins)
//! - ascending `first_accessed`, ties broken by id
//! - at most `max` entries; the oldest first-accessed entries are evicted

use std::collections::HashMap;

use crate::models::{ItemPatch, NavigationItem};

/// Ordered list of tracked items.
pub type NavigationHistory = Vec<NavigationItem>;

pub fn contains(history: &[NavigationItem], id: &str) -> bool {
    history.iter().any(|item| item.id == id)
}

pub fn position(history: &[NavigationItem], id: &str) -> Option<usize> {
    history.iter().position(|item| item.id == id)
}

pub fn get<'a>(history: &'a [NavigationItem], id: &str) -> Option<&'a NavigationItem> {
    history.iter().find(|item| item.id == id)
}

/// Insert a new item or refresh an existing one.
///
/// Existing entries keep `first_accessed` and get the patch merged in with
/// `last_accessed = now`; new entries get both timestamps set to `now`.
pub fn add_or_touch(
    history: &[NavigationItem],
    patch: &ItemPatch,
    now: i64,
    max: usize,
) -> NavigationHistory {
    let mut next = history.to_vec();

    // Touch every entry with this id, duplicates included; normalize collapses them
    let mut found = false;
    for item in next.iter_mut().filter(|item| item.id == patch.id) {
        item.touch(patch, now);
        found = true;
    }

    if !found {
        next.push(NavigationItem::from_patch(patch, now));
    }

    normalize(next, max)
}

/// Drop `id`. Order of the remaining items is untouched.
pub fn remove(history: &[NavigationItem], id: &str) -> NavigationHistory {
    history.iter().filter(|item| item.id != id).cloned().collect()
}

/// Apply a signed count delta, saturating at zero. No-op if `id` is not tracked.
pub fn adjust_count(history: &[NavigationItem], id: &str, delta: i64) -> NavigationHistory {
    history
        .iter()
        .map(|item| {
            if item.id != id {
                return item.clone();
            }
            let adjusted = i64::from(item.count)
                .saturating_add(delta)
                .clamp(0, i64::from(u32::MAX));
            NavigationItem {
                count: adjusted as u32,
                ..item.clone()
            }
        })
        .collect()
}

/// Overwrite counts for the listed ids. Never reorders, never adds or drops items.
pub fn apply_counts(history: &[NavigationItem], counts: &[(String, u32)]) -> NavigationHistory {
    let by_id: HashMap<&str, u32> = counts.iter().map(|(id, c)| (id.as_str(), *c)).collect();

    history
        .iter()
        .map(|item| match by_id.get(item.id.as_str()) {
            Some(&count) => NavigationItem {
                count,
                ..item.clone()
            },
            None => item.clone(),
        })
        .collect()
}

/// De-duplicate, sort and bound a list.
pub fn normalize(items: Vec<NavigationItem>, max: usize) -> NavigationHistory {
    let mut by_id: HashMap<String, NavigationItem> = HashMap::with_capacity(items.len());
    for item in items {
        match by_id.get(&item.id) {
            Some(existing) if existing.last_accessed >= item.last_accessed => {
                // Keep existing (touched more recently or equal)
            }
            _ => {
                by_id.insert(item.id.clone(), item);
            }
        }
    }

    let mut history: NavigationHistory = by_id.into_values().collect();
    history.sort_by(|a, b| {
        a.first_accessed
            .cmp(&b.first_accessed)
            .then_with(|| a.id.cmp(&b.id))
    });

    if history.len() > max {
        let excess = history.len() - max;
        history.drain(..excess);
    }

    history
}

/// True when the list already satisfies every invariant `normalize` enforces.
pub fn is_normalized(history: &[NavigationItem], max: usize) -> bool {
    if history.len() > max {
        return false;
    }
    let mut seen = std::collections::HashSet::with_capacity(history.len());
    history.iter().all(|item| seen.insert(item.id.as_str()))
        && history
            .windows(2)
            .all(|pair| pair[0].first_accessed <= pair[1].first_accessed)
}
