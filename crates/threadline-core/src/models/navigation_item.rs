use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ITEM_TITLE, UNSORTED_THREAD_ID};

/// A recently visited thread or space.
///
/// Serialized with camelCase field names; this is the on-disk layout of the
/// `history-v2` key and of the pending-transfer slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub count: u32,
    /// Opaque display token, never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_gradient: Option<String>,
    /// Set once when the item is first tracked.
    pub first_accessed: i64,
    /// Bumped on every touch. Never affects ordering.
    pub last_accessed: i64,
}

impl NavigationItem {
    /// Create a fresh item from a patch, stamping both timestamps with `now`.
    pub fn from_patch(patch: &ItemPatch, now: i64) -> Self {
        Self {
            id: patch.id.clone(),
            title: patch
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_ITEM_TITLE.to_string()),
            count: patch.count.unwrap_or(0),
            background_gradient: patch.background_gradient.clone(),
            first_accessed: now,
            last_accessed: now,
        }
    }

    pub fn is_unsorted(&self) -> bool {
        self.id == UNSORTED_THREAD_ID
    }

    /// Merge the present fields of `patch` and bump `last_accessed`.
    /// `first_accessed` is left alone.
    pub(crate) fn touch(&mut self, patch: &ItemPatch, now: i64) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(count) = patch.count {
            self.count = count;
        }
        if let Some(gradient) = &patch.background_gradient {
            self.background_gradient = Some(gradient.clone());
        }
        // Clock skew must not move last_accessed backwards
        self.last_accessed = self.last_accessed.max(now);
    }
}

/// Partial update used by add-or-touch. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub id: String,
    pub title: Option<String>,
    pub count: Option<u32>,
    pub background_gradient: Option<String>,
}

impl ItemPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn background_gradient(mut self, gradient: impl Into<String>) -> Self {
        self.background_gradient = Some(gradient.into());
        self
    }
}

impl From<&NavigationItem> for ItemPatch {
    fn from(item: &NavigationItem) -> Self {
        Self {
            id: item.id.clone(),
            title: Some(item.title.clone()),
            count: Some(item.count),
            background_gradient: item.background_gradient.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let item = NavigationItem {
            id: "t1".to_string(),
            title: "Romans".to_string(),
            count: 3,
            background_gradient: Some("linear-gradient(red, blue)".to_string()),
            first_accessed: 100,
            last_accessed: 200,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["firstAccessed"], 100);
        assert_eq!(json["lastAccessed"], 200);
        assert_eq!(json["backgroundGradient"], "linear-gradient(red, blue)");
    }

    #[test]
    fn test_deserializes_sparse_legacy_entry() {
        let item: NavigationItem =
            serde_json::from_str(r#"{"id":"t1","firstAccessed":5,"lastAccessed":6}"#).unwrap();
        assert_eq!(item.title, "");
        assert_eq!(item.count, 0);
        assert!(item.background_gradient.is_none());
    }

    #[test]
    fn test_from_patch_defaults() {
        let item = NavigationItem::from_patch(&ItemPatch::new("t2"), 42);
        assert_eq!(item.title, DEFAULT_ITEM_TITLE);
        assert_eq!(item.count, 0);
        assert_eq!(item.first_accessed, 42);
        assert_eq!(item.last_accessed, 42);
    }

    #[test]
    fn test_touch_keeps_first_accessed() {
        let mut item = NavigationItem::from_patch(&ItemPatch::new("t1").count(1), 100);
        item.touch(&ItemPatch::new("t1").count(5), 300);
        assert_eq!(item.count, 5);
        assert_eq!(item.first_accessed, 100);
        assert_eq!(item.last_accessed, 300);
        assert_eq!(item.title, DEFAULT_ITEM_TITLE);
    }
}
