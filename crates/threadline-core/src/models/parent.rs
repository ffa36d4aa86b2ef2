use serde::{Deserialize, Serialize};

use super::navigation_item::ItemPatch;
use crate::constants::DASHBOARD_ID;

/// One record of the thread/space listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Number of notes the server attributes to this parent.
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub background_gradient: Option<String>,
}

/// The dashboard is listed by the backend but is never a navigation target.
pub fn is_trackable_id(id: &str) -> bool {
    !id.is_empty() && id != DASHBOARD_ID
}

impl ParentSummary {
    pub fn is_trackable(&self) -> bool {
        is_trackable_id(&self.id)
    }
}

impl From<&ParentSummary> for ItemPatch {
    fn from(parent: &ParentSummary) -> Self {
        Self {
            id: parent.id.clone(),
            title: Some(parent.title.clone()),
            count: Some(parent.count),
            background_gradient: parent.background_gradient.clone(),
        }
    }
}
