pub mod navigation_item;
pub mod parent;

pub use navigation_item::{ItemPatch, NavigationItem};
pub use parent::{is_trackable_id, ParentSummary};
