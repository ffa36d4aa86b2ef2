//! Navigation service: the context object handed to every consumer.
//!
//! All history changes go through [`NavigationService::commit`], which applies a
//! pure [`Mutation`] to the freshest in-memory state, persists synchronously
//! and then notifies subscribers. Event handlers never hold on to a snapshot
//! across an await; background work (reconciliation, cold-start inserts)
//! re-reads the state when it applies its result.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CoreConfig;
use crate::constants::UNSORTED_THREAD_ID;
use crate::error::NavError;
use crate::events::{EventBridge, NavEvent, SubscriptionId};
use crate::history::{self, NavigationHistory};
use crate::listing::{HttpParentListing, ParentListing};
use crate::models::{is_trackable_id, ItemPatch, NavigationItem, ParentSummary};
use crate::reconciler::{reconcile_diff, Debouncer};
use crate::removal::{removal_target, NavigationTarget};
use crate::resolver::{
    resolve, resolve_with_retries, HintSource, Location, PageHints, Resolution, RetryPolicy,
};
use crate::store::{FileStore, HistoryStorage, KeyValueStore, MemoryStore, PendingTransfer};

/// Performs full-document navigations on behalf of the service.
pub trait Navigator: Send + Sync {
    fn navigate_hard(&self, location: &str);
}

/// Navigator for hosts without a router; records the request in the log.
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate_hard(&self, location: &str) {
        tracing::info!("navigation requested: {}", location);
    }
}

/// Millisecond wall clock, injectable for deterministic timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Every way the history can change.
#[derive(Debug, Clone)]
pub enum Mutation {
    Touch(ItemPatch),
    Remove(String),
    AdjustCount { id: String, delta: i64 },
    /// Overwrite counts from a canonical listing; the diff is taken against
    /// the history current at apply time.
    Reconcile(Vec<ParentSummary>),
}

impl Mutation {
    pub fn apply(&self, history: &[NavigationItem], now: i64, max: usize) -> NavigationHistory {
        match self {
            Mutation::Touch(patch) => history::add_or_touch(history, patch, now, max),
            Mutation::Remove(id) => history::remove(history, id),
            Mutation::AdjustCount { id, delta } => history::adjust_count(history, id, *delta),
            Mutation::Reconcile(canonical) => {
                let diff = reconcile_diff(history, canonical);
                if diff.is_empty() {
                    return history.to_vec();
                }
                history::apply_counts(history, &diff.counts)
            }
        }
    }
}

struct NavState {
    history: NavigationHistory,
    active_id: String,
    sentinel_closed: bool,
}

struct Inner {
    config: CoreConfig,
    state: Mutex<NavState>,
    storage: HistoryStorage,
    pending: PendingTransfer,
    listing: Arc<dyn ParentListing>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    bridge: EventBridge,
    debouncer: Debouncer,
    // Parents with a cold-start fetch outstanding
    inserting: Mutex<HashSet<String>>,
}

#[derive(Clone)]
pub struct NavigationService {
    inner: Arc<Inner>,
}

pub struct NavigationServiceBuilder {
    config: CoreConfig,
    primary: Option<Arc<dyn KeyValueStore>>,
    fallback: Option<Arc<dyn KeyValueStore>>,
    session: Option<Arc<dyn KeyValueStore>>,
    listing: Option<Arc<dyn ParentListing>>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Option<Arc<dyn Clock>>,
}

impl NavigationServiceBuilder {
    pub fn primary_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.primary = Some(store);
        self
    }

    pub fn fallback_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    /// Secondary store holding the pending-transfer slot.
    pub fn session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn listing(mut self, listing: Arc<dyn ParentListing>) -> Self {
        self.listing = Some(listing);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the service and load its initial state, the equivalent of a
    /// fresh page load.
    pub fn build(self) -> anyhow::Result<NavigationService> {
        let config = self.config;

        let primary = self
            .primary
            .unwrap_or_else(|| Arc::new(FileStore::new(config.primary_store_path())));
        let fallback = self
            .fallback
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(FileStore::new(config.session_store_path())));
        let listing: Arc<dyn ParentListing> = match self.listing {
            Some(listing) => listing,
            None => Arc::new(HttpParentListing::new(
                config.listing_url.clone(),
                config.request_timeout,
            )?),
        };

        let storage = HistoryStorage::new(primary, fallback, config.max_history);
        let debouncer = Debouncer::new(config.reconcile_debounce);

        let service = NavigationService {
            inner: Arc::new(Inner {
                state: Mutex::new(NavState {
                    history: Vec::new(),
                    active_id: String::new(),
                    sentinel_closed: false,
                }),
                storage,
                pending: PendingTransfer::new(session),
                listing,
                navigator: self.navigator.unwrap_or_else(|| Arc::new(LoggingNavigator)),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                bridge: EventBridge::new(),
                debouncer,
                inserting: Mutex::new(HashSet::new()),
                config,
            }),
        };
        service.load_initial_state();
        Ok(service)
    }
}

impl NavigationService {
    pub fn builder(config: CoreConfig) -> NavigationServiceBuilder {
        NavigationServiceBuilder {
            config,
            primary: None,
            fallback: None,
            session: None,
            listing: None,
            navigator: None,
            clock: None,
        }
    }

    /// Claim the pending-transfer slot, then read the persisted history and
    /// merge the claimed item in if the persisted write had not landed.
    fn load_initial_state(&self) {
        let inner = &self.inner;
        let claimed = inner.pending.claim();
        let mut loaded = inner.storage.read();
        let sentinel_closed = inner.storage.sentinel_closed();

        if let Some(item) = claimed {
            if history::contains(&loaded, &item.id) {
                tracing::debug!("engine: pending item {} already persisted", item.id);
            } else {
                tracing::info!("engine: restoring pending item {}", item.id);
                loaded = history::add_or_touch(
                    &loaded,
                    &ItemPatch::from(&item),
                    item.first_accessed,
                    inner.config.max_history,
                );
                inner.storage.write(&loaded);
            }
        }

        tracing::info!(
            "engine: loaded {} history items (backend={:?}, sentinel_closed={})",
            loaded.len(),
            inner.storage.backend(),
            sentinel_closed
        );

        let mut state = inner.state.lock();
        state.history = loaded;
        state.sentinel_closed = sentinel_closed;
    }

    // ===== Public surface =====

    pub fn get_history(&self) -> NavigationHistory {
        self.inner.state.lock().history.clone()
    }

    pub fn get_active_id(&self) -> String {
        self.inner.state.lock().active_id.clone()
    }

    pub fn is_sentinel_closed(&self) -> bool {
        self.inner.state.lock().sentinel_closed
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Register a consumer. It is called with the new history after every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[NavigationItem]) + Send + Sync + 'static,
    {
        let id = self.inner.bridge.subscribe(Arc::new(callback));
        tracing::debug!(
            "engine: subscriber added ({} total)",
            self.inner.bridge.subscriber_count()
        );
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bridge.unsubscribe(id)
    }

    /// Apply `mutation` to the current history, persist and notify.
    /// Returns false (and does nothing else) when the history is unchanged.
    pub fn commit(&self, mutation: Mutation) -> bool {
        let now = self.inner.clock.now_millis();
        let snapshot = {
            let mut state = self.inner.state.lock();
            let next = mutation.apply(&state.history, now, self.inner.config.max_history);
            if next == state.history {
                return false;
            }
            state.history = next;
            self.inner.storage.write(&state.history);
            state.history.clone()
        };

        tracing::debug!("engine: committed {:?} ({} items)", mutation, snapshot.len());
        self.inner.bridge.notify(&snapshot);
        true
    }

    /// Remove a tracked item. If it was the active one, persists first and
    /// then hard-navigates to its neighbour (or home). Returns the target.
    pub fn remove_item(&self, id: &str) -> Option<NavigationTarget> {
        let target = {
            let state = self.inner.state.lock();
            if !history::contains(&state.history, id) {
                return None;
            }
            removal_target(&state.history, id, &state.active_id)
        };

        self.commit(Mutation::Remove(id.to_string()));

        if id == UNSORTED_THREAD_ID {
            self.set_sentinel_closed(true);
        }

        if let Some(target) = &target {
            self.navigate_to(target);
        }
        target
    }

    /// Dispatch a domain or lifecycle event.
    pub fn handle_event(&self, event: NavEvent) {
        if let Some((parent_id, delta)) = event.count_delta() {
            self.apply_optimistic(parent_id, delta);
            return;
        }

        match event {
            NavEvent::ParentCreated(parent) => {
                if parent.is_trackable() {
                    self.commit(Mutation::Touch(ItemPatch::from(&parent)));
                }
            }
            NavEvent::ParentDeleted { parent_id } => {
                self.remove_item(&parent_id);
            }
            NavEvent::PageNavigated {
                location,
                hints,
                parent,
            } => self.page_navigated(&location, &hints, parent),
            // Count events are handled above
            NavEvent::EntityCreated { .. }
            | NavEvent::EntityDeleted { .. }
            | NavEvent::EntityMovedIn { .. }
            | NavEvent::EntityMovedOut { .. } => {}
        }
    }

    /// Re-evaluate the active id once for a completed navigation and record the visit.
    pub fn page_navigated(
        &self,
        location: &Location,
        hints: &PageHints,
        parent: Option<ParentSummary>,
    ) {
        self.apply_resolution(resolve(location, hints), parent);
    }

    /// Like [`page_navigated`](Self::page_navigated), for pages that publish
    /// their parent hints after first paint. Polls `source` with the bounded
    /// retry policy before resolving.
    pub async fn page_navigated_deferred(
        &self,
        location: &Location,
        source: &dyn HintSource,
        parent: Option<ParentSummary>,
    ) {
        let resolution = resolve_with_retries(location, source, RetryPolicy::default()).await;
        self.apply_resolution(resolution, parent);
    }

    /// Record a creation that is about to be followed by a hard navigation.
    /// The item is committed locally and stashed for the next page to claim.
    pub fn stash_for_navigation(&self, parent: &ParentSummary) -> Option<NavigationItem> {
        if !parent.is_trackable() {
            return None;
        }
        if parent.id == UNSORTED_THREAD_ID {
            self.set_sentinel_closed(false);
        }

        self.commit(Mutation::Touch(ItemPatch::from(parent)));

        let item = {
            let state = self.inner.state.lock();
            history::get(&state.history, &parent.id).cloned()
        }
        .unwrap_or_else(|| {
            NavigationItem::from_patch(&ItemPatch::from(parent), self.inner.clock.now_millis())
        });

        self.inner.pending.stash(&item);
        Some(item)
    }

    /// Fetch canonical counts now and merge them into the latest history.
    /// Returns true if any count changed.
    pub async fn reconcile_now(&self) -> bool {
        let canonical = match self.inner.listing.list_parents().await {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::warn!("engine: {} (keeping optimistic counts)", NavError::reconcile(e));
                return false;
            }
        };
        self.commit(Mutation::Reconcile(canonical))
    }

    /// Queue a debounced reconciliation pass.
    pub fn schedule_reconcile(&self) {
        let service = self.clone();
        self.inner.debouncer.schedule(move || async move {
            service.reconcile_now().await;
        });
    }

    // ===== Internals =====

    fn apply_resolution(&self, resolution: Resolution, parent: Option<ParentSummary>) {
        let active_id = resolution.active_id().to_string();
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.active_id != active_id;
            state.active_id = active_id;
            changed
        };

        let touched = match resolution {
            Resolution::Entity(id) => self.visit(&id, parent),
            // Highlight only; never reopens or inserts the sentinel
            Resolution::Fallback => {
                let tracked =
                    history::contains(&self.inner.state.lock().history, UNSORTED_THREAD_ID);
                tracked && self.commit(Mutation::Touch(ItemPatch::new(UNSORTED_THREAD_ID)))
            }
            Resolution::NonEntity => false,
        };

        if changed && !touched {
            self.notify_current();
        }
    }

    fn apply_optimistic(&self, parent_id: &str, delta: i64) {
        if parent_id.is_empty() {
            return;
        }

        let tracked = history::contains(&self.inner.state.lock().history, parent_id);
        if tracked {
            self.commit(Mutation::AdjustCount {
                id: parent_id.to_string(),
                delta,
            });
            self.schedule_reconcile();
        } else {
            self.spawn_cold_start_insert(parent_id.to_string());
        }
    }

    /// Touch `id` as visited. Returns true if the history changed.
    fn visit(&self, id: &str, parent: Option<ParentSummary>) -> bool {
        if id == UNSORTED_THREAD_ID && self.is_sentinel_closed() {
            self.set_sentinel_closed(false);
        }

        if let Some(parent) = parent.filter(|p| p.id == id && p.is_trackable()) {
            return self.commit(Mutation::Touch(ItemPatch::from(&parent)));
        }

        let tracked = history::contains(&self.inner.state.lock().history, id);
        if tracked {
            self.commit(Mutation::Touch(ItemPatch::new(id)))
        } else {
            self.spawn_cold_start_insert(id.to_string());
            false
        }
    }

    /// Fetch canonical data for an untracked parent and insert it if still eligible.
    fn spawn_cold_start_insert(&self, parent_id: String) {
        if !self.is_insert_eligible(&parent_id) {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!("engine: no async runtime, cannot fetch parent {}", parent_id);
            return;
        }
        if !self.inner.inserting.lock().insert(parent_id.clone()) {
            // Fetch already outstanding
            return;
        }

        let service = self.clone();
        tokio::spawn(async move {
            service.cold_start_insert(&parent_id).await;
            service.inner.inserting.lock().remove(&parent_id);
        });
    }

    async fn cold_start_insert(&self, parent_id: &str) {
        let parent = match self.inner.listing.fetch_parent(parent_id).await {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                tracing::debug!("engine: parent {} not in listing, not tracking", parent_id);
                return;
            }
            Err(e) => {
                tracing::warn!("engine: failed to fetch parent {}: {}", parent_id, e);
                return;
            }
        };

        if !parent.is_trackable() || !self.is_insert_eligible(&parent.id) {
            return;
        }
        if history::contains(&self.inner.state.lock().history, &parent.id) {
            // Tracked in the meantime; a count adjustment would double count
            self.schedule_reconcile();
            return;
        }

        self.commit(Mutation::Touch(ItemPatch::from(&parent)));
    }

    fn is_insert_eligible(&self, parent_id: &str) -> bool {
        if !is_trackable_id(parent_id) {
            return false;
        }
        !(parent_id == UNSORTED_THREAD_ID && self.is_sentinel_closed())
    }

    fn set_sentinel_closed(&self, closed: bool) {
        {
            let mut state = self.inner.state.lock();
            if state.sentinel_closed == closed {
                return;
            }
            state.sentinel_closed = closed;
        }
        self.inner.storage.set_sentinel_closed(closed);
    }

    fn navigate_to(&self, target: &NavigationTarget) {
        let location = match target {
            NavigationTarget::Item(id) => format!("/{}", id),
            NavigationTarget::Home => self.inner.config.home_location.clone(),
        };
        self.inner.navigator.navigate_hard(&location);
    }

    fn notify_current(&self) {
        let snapshot = self.get_history();
        self.inner.bridge.notify(&snapshot);
    }
}
