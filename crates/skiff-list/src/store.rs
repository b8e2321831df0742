//! Unified list state machine over one request operation.

use crate::params::{DEFAULT_PAGE_SIZE, FetchParams};
use crate::payload::{NormalizedPage, PagePayload, normalize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use skiff_client::{
    CallSpec, ExpiryNotifier, RequestError, RequestOperation, RequestResult, Transport,
};
use skiff_events::{DomainEvent, Emitter, Handle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Accumulated list state presented to the view layer.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    /// Items accumulated in fetch order.
    pub data_source: Vec<T>,
    /// 1-based index of the last fetched page; monotonic within one filter
    /// generation.
    pub page: u64,
    /// Page size in effect.
    pub page_size: u64,
    /// Total item count, when an offset backend reported one.
    pub total: Option<u64>,
    /// Whether the list is exhausted for the current filter generation.
    pub no_more: bool,
    /// Whether page 1 of the current generation came back with no items.
    pub empty: bool,
    /// Error of the latest failed fetch; successful fetches clear it.
    pub error: Option<RequestError>,
    /// Filter fields of the current generation.
    pub filters: Map<String, Value>,
    /// Whether a first fetch has been applied.
    pub initialized: bool,
    /// Cursor for the next page, when the backend uses one.
    pub next_marker: Option<String>,
}

impl<T> ListState<T> {
    fn with_page_size(page_size: u64) -> Self {
        Self {
            data_source: Vec::new(),
            page: 1,
            page_size,
            total: None,
            no_more: false,
            empty: false,
            error: None,
            filters: Map::new(),
            initialized: false,
            next_marker: None,
        }
    }
}

/// Events published by a [`ListStore`].
#[derive(Debug, Clone)]
pub enum ListEvent<T: Clone + Send + 'static> {
    /// The accumulated state changed.
    StateChanged(ListState<T>),
}

/// Discriminator for [`ListEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListEventKind {
    /// Channel for [`ListEvent::StateChanged`].
    StateChanged,
}

impl<T: Clone + Send + 'static> DomainEvent for ListEvent<T> {
    type Kind = ListEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::StateChanged(_) => ListEventKind::StateChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Apply {
    Replace,
    Append,
}

/// Paginated-list store reconciling offset and cursor backends.
///
/// `search`/`reset` open a new filter generation: accumulated items are
/// discarded, the underlying operation is renewed so a superseded in-flight
/// call cannot collide with the new one, and any response still carrying an
/// older generation is dropped on arrival.
pub struct ListStore<T: Clone + Send + 'static> {
    op: Mutex<Arc<RequestOperation<FetchParams, PagePayload<T>>>>,
    state: Mutex<ListState<T>>,
    generation: AtomicU64,
    emitter: Emitter<ListEvent<T>>,
}

impl<T: Clone + Send + 'static> ListStore<T> {
    /// Wrap an existing list operation with the default page size.
    #[must_use]
    pub fn new(op: RequestOperation<FetchParams, PagePayload<T>>) -> Self {
        Self::with_page_size(op, DEFAULT_PAGE_SIZE)
    }

    /// Wrap an existing list operation with an explicit page size.
    #[must_use]
    pub fn with_page_size(op: RequestOperation<FetchParams, PagePayload<T>>, page_size: u64) -> Self {
        Self {
            op: Mutex::new(Arc::new(op)),
            state: Mutex::new(ListState::with_page_size(page_size)),
            generation: AtomicU64::new(0),
            emitter: Emitter::new(),
        }
    }

    /// First fetch at page 1, only if nothing has been loaded yet.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; an already-initialized or already-loading
    /// store is a successful no-op.
    pub async fn init(&self) -> RequestResult<()> {
        let (op, params) = {
            let state = self.lock_state();
            if state.initialized {
                return Ok(());
            }
            (
                self.current_op(),
                FetchParams::first_page(state.page_size, state.filters.clone()),
            )
        };
        if op.is_pending() {
            return Ok(());
        }
        let generation = self.generation.load(Ordering::SeqCst);
        self.fetch(&op, params, Apply::Replace, generation).await
    }

    /// Replace the filter params, discard accumulated items and fetch page 1.
    ///
    /// Opens a new filter generation: any response to a fetch issued before
    /// this call is dropped when it arrives.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; the discarded state is already published.
    pub async fn search(&self, filters: Map<String, Value>) -> RequestResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (params, snapshot) = {
            let mut state = self.lock_state();
            state.data_source.clear();
            state.page = 1;
            state.total = None;
            state.no_more = false;
            state.empty = false;
            state.error = None;
            state.next_marker = None;
            state.filters.clone_from(&filters);
            (
                FetchParams::first_page(state.page_size, filters),
                state.clone(),
            )
        };
        let op = self.renew_op();
        self.emitter.emit(&ListEvent::StateChanged(snapshot));
        self.fetch(&op, params, Apply::Replace, generation).await
    }

    /// Equivalent to `search` with no filters.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn reset(&self) -> RequestResult<()> {
        self.search(Map::new()).await
    }

    /// Fetch the next page or cursor and append its items.
    ///
    /// A no-op while the list is exhausted, not yet loaded, or a fetch is
    /// already pending.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; accumulated items and the page counter stay
    /// untouched on failure.
    pub async fn load_more(&self) -> RequestResult<()> {
        let (op, params) = {
            let state = self.lock_state();
            if !state.initialized || state.no_more {
                return Ok(());
            }
            let params = FetchParams {
                page: state.page + 1,
                page_size: state.page_size,
                next_marker: state.next_marker.clone(),
                filters: state.filters.clone(),
            };
            (self.current_op(), params)
        };
        if op.is_pending() {
            return Ok(());
        }
        let generation = self.generation.load(Ordering::SeqCst);
        self.fetch(&op, params, Apply::Append, generation).await
    }

    /// Re-fetch page 1 with the current filters, keeping shown items until
    /// the response lands.
    ///
    /// Opens a new filter generation, so the page counter restarting at 1
    /// never rewinds an older accumulation and any in-flight fetch is
    /// superseded.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn refresh(&self) -> RequestResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let params = {
            let state = self.lock_state();
            FetchParams::first_page(state.page_size, state.filters.clone())
        };
        let op = self.renew_op();
        self.fetch(&op, params, Apply::Replace, generation).await
    }

    /// Snapshot of the accumulated state.
    #[must_use]
    pub fn state(&self) -> ListState<T> {
        self.lock_state().clone()
    }

    /// Subscribe to state snapshots.
    pub fn on_state_changed<F>(&self, handler: F) -> Handle
    where
        F: Fn(&ListState<T>) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(ListEventKind::StateChanged, move |event| {
                let ListEvent::StateChanged(state) = event;
                handler(state);
                Ok(())
            })
    }

    async fn fetch(
        &self,
        op: &RequestOperation<FetchParams, PagePayload<T>>,
        params: FetchParams,
        apply: Apply,
        generation: u64,
    ) -> RequestResult<()> {
        let requested_page = params.page;
        let fallback_page_size = params.page_size;
        let outcome = op.run(params).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(
                generation,
                "dropping list response from a superseded filter generation"
            );
            return Ok(());
        }
        match outcome {
            Ok(payload) => {
                let page = normalize(payload, requested_page, fallback_page_size);
                let snapshot = {
                    let mut state = self.lock_state();
                    apply_page(&mut state, page, apply);
                    state.clone()
                };
                self.emitter.emit(&ListEvent::StateChanged(snapshot));
                Ok(())
            }
            Err(error) => {
                let snapshot = {
                    let mut state = self.lock_state();
                    state.error = Some(error.clone());
                    state.clone()
                };
                self.emitter.emit(&ListEvent::StateChanged(snapshot));
                Err(error)
            }
        }
    }

    fn current_op(&self) -> Arc<RequestOperation<FetchParams, PagePayload<T>>> {
        Arc::clone(
            &self
                .op
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    fn renew_op(&self) -> Arc<RequestOperation<FetchParams, PagePayload<T>>> {
        let mut slot = self
            .op
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let fresh = Arc::new(slot.renew());
        *slot = Arc::clone(&fresh);
        fresh
    }

    fn lock_state(&self) -> MutexGuard<'_, ListState<T>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn apply_page<T>(state: &mut ListState<T>, page: NormalizedPage<T>, apply: Apply) {
    state.page = page.page;
    state.page_size = page.page_size;
    state.total = page.total.or(state.total);
    state.next_marker = page.next_marker;
    state.error = None;
    state.initialized = true;
    match apply {
        Apply::Replace => {
            state.data_source = page.items;
            state.no_more = page.no_more;
            state.empty = page.empty;
        }
        Apply::Append => {
            state.data_source.extend(page.items);
            // Exhaustion never un-happens within a generation.
            state.no_more = state.no_more || page.no_more;
        }
    }
}

impl<T> ListStore<T>
where
    T: Clone + Send + DeserializeOwned + 'static,
{
    /// Build a store for a POST list endpoint whose items deserialize into
    /// `T`, serializing the fetch parameters as the call body.
    ///
    /// A success envelope carrying no data counts as an empty page, not a
    /// parse failure.
    #[must_use]
    pub fn from_endpoint(
        transport: Arc<dyn Transport>,
        expiry: ExpiryNotifier,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self::new(RequestOperation::with_mapper(
            transport,
            expiry,
            move |params| {
                CallSpec::post(
                    path.clone(),
                    serde_json::to_value(params).unwrap_or(Value::Null),
                )
            },
            |value| {
                if value.is_null() {
                    return Ok(PagePayload::empty());
                }
                serde_json::from_value(value).map_err(|err| RequestError::parse(err.to_string()))
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use skiff_client::Envelope;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Replies with queued payloads in order, repeating the last one.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Value>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn dispatch(&self, _call: CallSpec) -> RequestResult<Envelope<Value>> {
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().expect("scripted reply")
            };
            Ok(Envelope::ok(reply))
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn dispatch(&self, _call: CallSpec) -> RequestResult<Envelope<Value>> {
            Err(RequestError::transport("connection reset"))
        }
    }

    fn store_for(replies: Vec<Value>) -> ListStore<String> {
        ListStore::from_endpoint(
            ScriptedTransport::new(replies),
            ExpiryNotifier::new(),
            "/api/task/list",
        )
    }

    #[tokio::test]
    async fn init_loads_page_one_exactly_once() {
        let store = store_for(vec![
            json!({ "list": ["a", "b"], "page": 1, "page_size": 2, "total": 5 }),
            json!({ "list": ["never"], "page": 1, "page_size": 2, "total": 5 }),
        ]);
        store.init().await.expect("init");
        store.init().await.expect("second init is a no-op");

        let state = store.state();
        assert_eq!(state.data_source, vec!["a", "b"]);
        assert_eq!(state.page, 1);
        assert!(!state.no_more);
        assert!(!state.empty);
        assert!(state.initialized);
    }

    #[tokio::test]
    async fn load_more_appends_in_fetch_order_until_exhausted() {
        let store = store_for(vec![
            json!({ "list": ["a", "b"], "page": 1, "page_size": 2, "total": 5 }),
            json!({ "list": ["c", "d"], "page": 2, "page_size": 2, "total": 5 }),
            json!({ "list": ["e"], "page": 3, "page_size": 2, "total": 5 }),
        ]);
        store.init().await.expect("init");
        store.load_more().await.expect("page 2");
        store.load_more().await.expect("page 3");

        let state = store.state();
        assert_eq!(state.data_source, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(state.page, 3);
        assert!(state.no_more);
        let shown = u64::try_from(state.data_source.len()).unwrap();
        assert!(shown <= state.total.unwrap());

        // Exhausted: further calls are idempotent no-ops.
        store.load_more().await.expect("no-op");
        store.load_more().await.expect("no-op");
        assert_eq!(store.state().data_source.len(), 5);
    }

    #[tokio::test]
    async fn cursor_pages_chain_markers_until_null() {
        let store = store_for(vec![
            json!({ "list": ["a"], "next_marker": "m2" }),
            json!({ "list": ["b"], "next_marker": null }),
        ]);
        store.init().await.expect("init");
        assert_eq!(store.state().next_marker.as_deref(), Some("m2"));

        store.load_more().await.expect("cursor page");
        let state = store.state();
        assert_eq!(state.data_source, vec!["a", "b"]);
        assert!(state.no_more);
        assert_eq!(state.next_marker, None);
    }

    #[tokio::test]
    async fn search_resets_page_and_discards_items() {
        let store = store_for(vec![
            json!({ "list": ["a", "b"], "page": 1, "page_size": 2, "total": 4 }),
            json!({ "list": ["c", "d"], "page": 2, "page_size": 2, "total": 4 }),
            json!({ "list": ["x"], "page": 1, "page_size": 2, "total": 1 }),
        ]);
        store.init().await.expect("init");
        store.load_more().await.expect("page 2");
        assert_eq!(store.state().data_source.len(), 4);

        store
            .search(json!({ "keyword": "ubuntu" }).as_object().cloned().unwrap())
            .await
            .expect("search");
        let state = store.state();
        assert_eq!(state.data_source, vec!["x"]);
        assert_eq!(state.page, 1);
        assert!(state.no_more);
        assert_eq!(state.filters["keyword"], json!("ubuntu"));
    }

    #[tokio::test]
    async fn failed_load_more_keeps_shown_items() {
        let store = store_for(vec![
            json!({ "list": ["a", "b"], "page": 1, "page_size": 2, "total": 6 }),
        ]);
        store.init().await.expect("init");

        // Swap in a failing transport by driving the same store against a
        // failed fetch: renewing through search would discard items, so use a
        // second store wired to a failing transport for the page-2 call.
        let failing: ListStore<String> = ListStore::from_endpoint(
            Arc::new(FailingTransport),
            ExpiryNotifier::new(),
            "/api/task/list",
        );
        // Seed it with one good page first.
        {
            let seeded = store.state();
            let mut state = failing.lock_state();
            *state = seeded;
        }

        let error = failing.load_more().await.expect_err("transport failure");
        assert!(matches!(error, RequestError::Transport { .. }));
        let state = failing.state();
        assert_eq!(state.data_source, vec!["a", "b"]);
        assert_eq!(state.page, 1);
        assert!(state.error.is_some());
    }

    /// First dispatch blocks until released; later dispatches answer
    /// immediately.
    struct GatedFirstTransport {
        release: Notify,
        first: Value,
        rest: Value,
        calls: AtomicU64,
    }

    #[async_trait]
    impl Transport for GatedFirstTransport {
        async fn dispatch(&self, _call: CallSpec) -> RequestResult<Envelope<Value>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.release.notified().await;
                return Ok(Envelope::ok(self.first.clone()));
            }
            Ok(Envelope::ok(self.rest.clone()))
        }
    }

    #[tokio::test]
    async fn superseded_generation_response_is_dropped_on_arrival() {
        let transport = Arc::new(GatedFirstTransport {
            release: Notify::new(),
            first: json!({ "list": ["stale-1", "stale-2"], "page": 1, "page_size": 2, "total": 2 }),
            rest: json!({ "list": ["fresh"], "page": 1, "page_size": 2, "total": 1 }),
            calls: AtomicU64::new(0),
        });
        let store: Arc<ListStore<String>> = Arc::new(ListStore::from_endpoint(
            transport.clone(),
            ExpiryNotifier::new(),
            "/api/torrent/search",
        ));

        let stale = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.init().await })
        };
        // Let the init fetch reach the transport before superseding it.
        while transport.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        store
            .search(json!({ "keyword": "fresh" }).as_object().cloned().unwrap())
            .await
            .expect("search");
        assert_eq!(store.state().data_source, vec!["fresh"]);

        transport.release.notify_one();
        stale.await.expect("task").expect("stale fetch resolves");
        // The stale page must never reappear.
        let state = store.state();
        assert_eq!(state.data_source, vec!["fresh"]);
        assert_eq!(state.page, 1);
    }

    #[tokio::test]
    async fn state_changes_are_published() {
        let store = store_for(vec![
            json!({ "list": ["a"], "page": 1, "page_size": 20, "total": 1 }),
        ]);
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        {
            let snapshots = Arc::clone(&snapshots);
            store.on_state_changed(move |state| {
                snapshots.lock().unwrap().push(state.data_source.clone());
            });
        }
        store.init().await.expect("init");
        assert_eq!(*snapshots.lock().unwrap(), vec![vec!["a".to_string()]]);
    }

    #[derive(Debug, Clone, PartialEq, serde::Deserialize)]
    struct TaskRow {
        name: String,
    }

    #[tokio::test]
    async fn items_need_only_deserialize() {
        // TaskRow deliberately has no Default impl.
        let store: ListStore<TaskRow> = ListStore::from_endpoint(
            ScriptedTransport::new(vec![
                json!({ "list": [{ "name": "job-1" }], "page": 1, "page_size": 20, "total": 1 }),
            ]),
            ExpiryNotifier::new(),
            "/api/task/list",
        );
        store.init().await.expect("init");
        assert_eq!(
            store.state().data_source,
            vec![TaskRow {
                name: "job-1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn null_payload_is_an_empty_page() {
        let store = store_for(vec![Value::Null]);
        store.init().await.expect("init");

        let state = store.state();
        assert!(state.data_source.is_empty());
        assert!(state.empty);
        assert!(state.no_more);
        assert!(state.error.is_none());
        assert!(state.initialized);
    }

    #[tokio::test]
    async fn refresh_opens_a_new_generation_at_page_one() {
        let store = store_for(vec![
            json!({ "list": ["a", "b"], "page": 1, "page_size": 2, "total": 4 }),
            json!({ "list": ["c", "d"], "page": 2, "page_size": 2, "total": 4 }),
            json!({ "list": ["a2", "b2"], "page": 1, "page_size": 2, "total": 4 }),
        ]);
        store.init().await.expect("init");
        store.load_more().await.expect("page 2");
        assert!(store.state().no_more);

        store.refresh().await.expect("refresh");
        let state = store.state();
        assert_eq!(state.data_source, vec!["a2", "b2"]);
        assert_eq!(state.page, 1);
        // The fresh generation starts unexhausted and can page again.
        assert!(!state.no_more);
    }
}
