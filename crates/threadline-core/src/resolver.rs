//! Active-item resolution.
//!
//! The tracked entities are threads and spaces; notes are leaves viewed inside
//! a thread. When the current location is a note, the active id is its parent
//! thread, found through the typed hints the router hands over at render time.

use std::time::Duration;

use crate::constants::{
    NON_ENTITY_ROUTES, RESOLVE_MAX_RETRIES, RESOLVE_RETRY_BASE_DELAY_MS, UNSORTED_THREAD_ID,
};
use crate::error::NavError;

/// Current location as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// First path segment with the leading separator, query and fragment removed.
    pub fn raw_id(&self) -> &str {
        let path = self.path.split(['?', '#']).next().unwrap_or("");
        let path = path.trim_start_matches('/');
        path.split('/').next().unwrap_or("")
    }

    /// Home, dashboard and auth routes never denote a tracked entity.
    pub fn is_non_entity(&self) -> bool {
        let raw = self.raw_id();
        NON_ENTITY_ROUTES.contains(&raw)
    }
}

impl From<&str> for Location {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageKind {
    /// Thread or space page: the raw id is the active id.
    #[default]
    Parent,
    /// Note page: the active id is the note's parent thread.
    Leaf,
}

/// Parent references published by the page being viewed, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHints {
    pub kind: PageKind,
    /// Thread the caller already knows is current.
    pub current_thread_id: Option<String>,
    /// Parent id attached to the note's primary container.
    pub container_parent_id: Option<String>,
    /// Parent id attached to the secondary navigation container.
    pub nav_parent_id: Option<String>,
}

impl PageHints {
    pub fn parent() -> Self {
        Self::default()
    }

    pub fn leaf() -> Self {
        Self {
            kind: PageKind::Leaf,
            ..Self::default()
        }
    }

    pub fn with_current_thread(mut self, id: impl Into<String>) -> Self {
        self.current_thread_id = Some(id.into());
        self
    }

    pub fn with_container_parent(mut self, id: impl Into<String>) -> Self {
        self.container_parent_id = Some(id.into());
        self
    }

    pub fn with_nav_parent(mut self, id: impl Into<String>) -> Self {
        self.nav_parent_id = Some(id.into());
        self
    }

    /// First non-empty parent reference, if any.
    pub fn parent_hint(&self) -> Option<&str> {
        [
            self.current_thread_id.as_deref(),
            self.container_parent_id.as_deref(),
            self.nav_parent_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
    }
}

/// Outcome of resolving the current location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Home, dashboard or auth route.
    NonEntity,
    /// A tracked entity was identified.
    Entity(String),
    /// Leaf page with no usable parent hint; highlights the unsorted thread
    /// without counting as a visit to it.
    Fallback,
}

impl Resolution {
    /// Id to highlight as active.
    pub fn active_id(&self) -> &str {
        match self {
            Resolution::NonEntity => "",
            Resolution::Entity(id) => id,
            Resolution::Fallback => UNSORTED_THREAD_ID,
        }
    }
}

/// Resolve `location`. Never returns a leaf's own id.
pub fn resolve(location: &Location, hints: &PageHints) -> Resolution {
    if location.is_non_entity() {
        return Resolution::NonEntity;
    }

    let raw_id = location.raw_id();
    match hints.kind {
        PageKind::Parent => Resolution::Entity(raw_id.to_string()),
        PageKind::Leaf => match hints.parent_hint() {
            Some(parent) if parent != raw_id => Resolution::Entity(parent.to_string()),
            _ => {
                let err = NavError::ResolveAmbiguous {
                    leaf_id: raw_id.to_string(),
                };
                tracing::debug!("resolver: {}, using {}", err, UNSORTED_THREAD_ID);
                Resolution::Fallback
            }
        },
    }
}

/// Compute the id that should be highlighted as active. Never fails:
/// non-entity routes give `""`, unresolved leaves give the unsorted thread.
pub fn resolve_active_id(location: &Location, hints: &PageHints) -> String {
    resolve(location, hints).active_id().to_string()
}

/// Something that can report the page's current hints, which may still be
/// incomplete while the page is rendering.
pub trait HintSource: Send + Sync {
    fn current_hints(&self) -> PageHints;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: RESOLVE_MAX_RETRIES,
            base_delay: Duration::from_millis(RESOLVE_RETRY_BASE_DELAY_MS),
        }
    }
}

/// Like [`resolve_active_id`], but for leaf pages whose parent hint has not
/// been published yet: re-polls the source up to `max_retries` times with a
/// linearly increasing delay before degrading to the unsorted thread.
pub async fn resolve_with_retries(
    location: &Location,
    source: &dyn HintSource,
    policy: RetryPolicy,
) -> Resolution {
    let mut hints = source.current_hints();
    let mut attempt = 0;

    while needs_parent_hint(location, &hints) && attempt < policy.max_retries {
        attempt += 1;
        tokio::time::sleep(policy.base_delay * attempt).await;
        hints = source.current_hints();
    }

    if attempt > 0 {
        tracing::debug!(
            "resolver: {} resolved after {} retries",
            location.path,
            attempt
        );
    }
    resolve(location, &hints)
}

fn needs_parent_hint(location: &Location, hints: &PageHints) -> bool {
    !location.is_non_entity() && hints.kind == PageKind::Leaf && hints.parent_hint().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_raw_id() {
        assert_eq!(Location::new("/t1").raw_id(), "t1");
        assert_eq!(Location::new("/t1/edit?tab=notes#top").raw_id(), "t1");
        assert_eq!(Location::new("/").raw_id(), "");
        assert_eq!(Location::new("").raw_id(), "");
    }

    #[test]
    fn test_non_entity_routes_resolve_empty() {
        for path in ["/", "/dashboard", "/login", "/auth/callback", "/settings?x=1"] {
            assert_eq!(resolve_active_id(&path.into(), &PageHints::parent()), "", "{}", path);
        }
    }

    #[test]
    fn test_parent_page_returns_raw_id() {
        assert_eq!(resolve_active_id(&"/space-7".into(), &PageHints::parent()), "space-7");
    }

    #[test]
    fn test_leaf_fallback_chain_order() {
        let location = Location::new("/note-1");
        let hints = PageHints::leaf()
            .with_current_thread("t1")
            .with_container_parent("t2")
            .with_nav_parent("t3");
        assert_eq!(resolve_active_id(&location, &hints), "t1");

        let hints = PageHints::leaf()
            .with_current_thread("  ")
            .with_container_parent("t2")
            .with_nav_parent("t3");
        assert_eq!(resolve_active_id(&location, &hints), "t2");

        let hints = PageHints::leaf().with_nav_parent("t3");
        assert_eq!(resolve_active_id(&location, &hints), "t3");
    }

    #[test]
    fn test_leaf_without_hints_is_unsorted() {
        let resolved = resolve_active_id(&"/note-1".into(), &PageHints::leaf());
        assert_eq!(resolved, UNSORTED_THREAD_ID);
        assert_ne!(resolved, "note-1");
    }

    #[test]
    fn test_fallback_is_distinct_from_real_unsorted_page() {
        assert_eq!(resolve(&"/note-1".into(), &PageHints::leaf()), Resolution::Fallback);
        assert_eq!(
            resolve(&"/unsorted".into(), &PageHints::parent()),
            Resolution::Entity(UNSORTED_THREAD_ID.to_string())
        );
        assert_eq!(resolve(&"/login".into(), &PageHints::parent()), Resolution::NonEntity);
    }

    #[test]
    fn test_leaf_never_resolves_to_itself() {
        let hints = PageHints::leaf().with_current_thread("note-1");
        assert_eq!(resolve_active_id(&"/note-1".into(), &hints), UNSORTED_THREAD_ID);
    }

    /// Publishes a parent hint after a fixed number of polls.
    struct LatePaint {
        polls: AtomicU32,
        ready_after: u32,
        hints: Mutex<PageHints>,
    }

    impl HintSource for LatePaint {
        fn current_hints(&self) -> PageHints {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if polls > self.ready_after {
                self.hints.lock().clone()
            } else {
                PageHints::leaf()
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_hint_painted() {
        let source = LatePaint {
            polls: AtomicU32::new(0),
            ready_after: 2,
            hints: Mutex::new(PageHints::leaf().with_container_parent("t4")),
        };
        let resolution =
            resolve_with_retries(&"/note-9".into(), &source, RetryPolicy::default()).await;
        assert_eq!(resolution, Resolution::Entity("t4".to_string()));
        assert_eq!(source.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let source = LatePaint {
            polls: AtomicU32::new(0),
            ready_after: u32::MAX,
            hints: Mutex::new(PageHints::leaf()),
        };
        let resolution =
            resolve_with_retries(&"/note-9".into(), &source, RetryPolicy::default()).await;
        assert_eq!(resolution, Resolution::Fallback);
        // Initial poll plus three retries
        assert_eq!(source.polls.load(Ordering::SeqCst), 4);
    }
}
