pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod listing;
pub mod models;
pub mod reconciler;
pub mod removal;
pub mod resolver;
pub mod store;
pub mod tracing_setup;

// Re-export the service surface at crate root for convenience
pub use config::CoreConfig;
pub use engine::{Mutation, NavigationService, Navigator};
pub use error::NavError;
pub use events::{NavEvent, SubscriptionId};
pub use listing::{HttpParentListing, ParentListing};
pub use models::{ItemPatch, NavigationItem, ParentSummary};
pub use resolver::{HintSource, Location, PageHints, PageKind, Resolution};
