//! Query result cache
//!
//! Holds one entry per [`QueryKey`]: the last successful value, the last
//! error, when the value was fetched and which request is allowed to write
//! the next value. Fetches run as spawned tasks and are shared between all
//! callers waiting on the same key, so a key is fetched at most once at a
//! time. Every fetch gets a request id; a response whose id is no longer the
//! latest for its key is dropped, which keeps a slow, superseded request from
//! overwriting newer data.

use crate::keys::QueryKey;
use callscope_core::{Error, Result};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Type-erased query result
pub type AnyData = Arc<dyn Any + Send + Sync>;

/// Performs the remote fetch for one key. Called again on every refetch.
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyData>> + Send + Sync>;

type InFlight = Shared<BoxFuture<'static, ()>>;

/// Wrap a typed fetch closure into a [`QueryFn`]
pub fn query_fn<T, F, Fut>(fetch: F) -> QueryFn
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetch();
        async move { fut.await.map(|data| Arc::new(data) as AnyData) }.boxed()
    })
}

/// Snapshot of one query as seen by the view
#[derive(Debug)]
pub struct QueryState<T> {
    /// Last successfully fetched value
    pub data: Option<Arc<T>>,
    /// Error of the most recent failed fetch, cleared by the next success
    pub error: Option<Arc<Error>>,
    /// A fetch for this key is in flight
    pub is_fetching: bool,
    /// False when the query was skipped because its inputs are incomplete
    pub enabled: bool,
    /// When `data` was fetched
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            enabled: self.enabled,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    /// State of a query that is not allowed to run
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            enabled: false,
            updated_at: None,
        }
    }

    /// State of an enabled query that has never been fetched
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            enabled: true,
            updated_at: None,
        }
    }

    /// Fetching with nothing to show yet
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_fetching && self.data.is_none()
    }

    /// The latest fetch failed
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// A value is available, possibly alongside a background error
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Borrow the value
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

#[derive(Default)]
struct CacheEntry {
    data: Option<AnyData>,
    error: Option<Arc<Error>>,
    data_updated_at: Option<Instant>,
    invalidated: bool,
    latest_request: u64,
    in_flight: Option<(u64, InFlight)>,
    query_fn: Option<QueryFn>,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        !self.invalidated
            && self.data.is_some()
            && self
                .data_updated_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_time)
    }

    fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let data = self
            .data
            .clone()
            .and_then(|data| match data.downcast::<T>() {
                Ok(data) => Some(data),
                Err(_) => {
                    warn!(%key, "cached value has a different type than requested");
                    None
                }
            });

        QueryState {
            data,
            error: self.error.clone(),
            is_fetching: self.in_flight.is_some(),
            enabled: true,
            updated_at: self.data_updated_at,
        }
    }
}

struct CacheInner {
    entries: DashMap<QueryKey, CacheEntry>,
    stale_time: Duration,
    next_request: AtomicU64,
}

impl CacheInner {
    fn settle(&self, key: &QueryKey, request_id: u64, result: Result<AnyData>) {
        let Some(mut entry) = self.entries.get_mut(key) else {
            debug!(%key, request_id, "entry removed before the response arrived");
            return;
        };

        if entry.latest_request != request_id {
            debug!(
                %key,
                request_id,
                latest = entry.latest_request,
                "discarding superseded response"
            );
            return;
        }

        entry.in_flight = None;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.data_updated_at = Some(Instant::now());
                entry.invalidated = false;
                debug!(%key, request_id, "query settled");
            }
            Err(error) => {
                warn!(%key, request_id, %error, "query failed, keeping previous data");
                entry.error = Some(Arc::new(error));
            }
        }
    }
}

/// Shared cache of query results, cheap to clone
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.len())
            .field("stale_time", &self.inner.stale_time)
            .finish()
    }
}

impl QueryCache {
    /// Create a cache whose entries stay fresh for `stale_time`
    #[must_use]
    pub fn new(stale_time: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                stale_time,
                next_request: AtomicU64::new(0),
            }),
        }
    }

    /// The staleness window
    #[must_use]
    pub fn stale_time(&self) -> Duration {
        self.inner.stale_time
    }

    /// Read `key`, fetching with `query_fn` unless a fresh value is cached.
    ///
    /// Joins a request already in flight for the key instead of starting a
    /// second one. `query_fn` becomes the function used by later refetches
    /// and invalidations of this key.
    pub async fn fetch<T>(&self, key: &QueryKey, query_fn: QueryFn) -> QueryState<T>
    where
        T: Send + Sync + 'static,
    {
        let pending = {
            let mut entry = self.inner.entries.entry(key.clone()).or_default();
            entry.query_fn = Some(Arc::clone(&query_fn));

            if entry.is_fresh(Instant::now(), self.inner.stale_time) {
                debug!(%key, "serving fresh cache entry");
                return entry.snapshot(key);
            }

            if let Some(in_flight) = entry.in_flight.clone() {
                debug!(%key, request_id = in_flight.0, "joining in-flight request");
                in_flight
            } else {
                self.start_fetch(key, &mut entry, &query_fn)
            }
        };

        self.wait_settled(key, pending).await;
        self.state(key)
    }

    /// Fetch `key` again with its registered query function, superseding any
    /// request in flight. Does nothing for keys that were never fetched.
    pub async fn refetch<T>(&self, key: &QueryKey) -> QueryState<T>
    where
        T: Send + Sync + 'static,
    {
        let pending = {
            let Some(mut entry) = self.inner.entries.get_mut(key) else {
                return QueryState::empty();
            };
            let Some(query_fn) = entry.query_fn.clone() else {
                return entry.snapshot(key);
            };
            self.start_fetch(key, &mut entry, &query_fn)
        };

        self.wait_settled(key, pending).await;
        self.state(key)
    }

    /// Mark every entry whose key starts with `prefix` as stale and refetch
    /// it. Resolves once the refetches settle; returns how many entries
    /// were invalidated.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut pending = Vec::new();
        let mut invalidated = 0;

        for mut entry in self.inner.entries.iter_mut() {
            if !entry.key().starts_with(prefix) {
                continue;
            }
            invalidated += 1;

            let key = entry.key().clone();
            entry.invalidated = true;
            if let Some(query_fn) = entry.query_fn.clone() {
                let in_flight = self.start_fetch(&key, entry.value_mut(), &query_fn);
                pending.push((key, in_flight));
            }
        }

        debug!(%prefix, invalidated, refetching = pending.len(), "invalidated queries");

        futures::future::join_all(
            pending
                .into_iter()
                .map(|(key, in_flight)| async move { self.wait_settled(&key, in_flight).await }),
        )
        .await;

        invalidated
    }

    /// Current state of `key` without fetching
    #[must_use]
    pub fn state<T>(&self, key: &QueryKey) -> QueryState<T>
    where
        T: Send + Sync + 'static,
    {
        self.inner
            .entries
            .get(key)
            .map_or_else(QueryState::empty, |entry| entry.snapshot(key))
    }

    /// Drop `key`; a response still in flight for it is ignored
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Whether `key` has an entry
    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether the cache has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn start_fetch(
        &self,
        key: &QueryKey,
        entry: &mut CacheEntry,
        query_fn: &QueryFn,
    ) -> (u64, InFlight) {
        let request_id = self.inner.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        entry.latest_request = request_id;

        let fetch = query_fn();
        let inner = Arc::clone(&self.inner);
        let settle_key = key.clone();
        let in_flight = async move {
            let result = fetch.await;
            inner.settle(&settle_key, request_id, result);
        }
        .boxed()
        .shared();

        entry.in_flight = Some((request_id, in_flight.clone()));
        debug!(%key, request_id, "starting fetch");

        // Runs to completion even if every waiter goes away.
        tokio::spawn(in_flight.clone());

        (request_id, in_flight)
    }

    async fn wait_settled(&self, key: &QueryKey, mut pending: (u64, InFlight)) {
        loop {
            let (request_id, in_flight) = pending;
            in_flight.await;

            let next = self
                .inner
                .entries
                .get(key)
                .and_then(|entry| entry.in_flight.clone());
            match next {
                Some(next) if next.0 != request_id => pending = next,
                _ => return,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use callscope_core::OrganizationId;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{advance, sleep};

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn key(page: u32) -> QueryKey {
        QueryKey::transcripts(&OrganizationId::from("org1"), page, 5)
    }

    fn counting(calls: &Arc<AtomicUsize>, delay: Duration) -> QueryFn {
        let calls = Arc::clone(calls);
        query_fn(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                sleep(delay).await;
                Ok(n)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_not_refetched() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.fetch::<usize>(&key(1), counting(&calls, Duration::ZERO)).await;
        let second = cache.fetch::<usize>(&key(1), counting(&calls, Duration::ZERO)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.data(), Some(&1));
        assert_eq!(second.data(), Some(&1));
        assert!(!second.is_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_refetched_after_staleness_window() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch::<usize>(&key(1), counting(&calls, Duration::ZERO)).await;

        advance(HOUR - Duration::from_secs(1)).await;
        let state = cache.fetch::<usize>(&key(1), counting(&calls, Duration::ZERO)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.data(), Some(&1));

        advance(Duration::from_secs(2)).await;
        let state = cache.fetch::<usize>(&key(1), counting(&calls, Duration::ZERO)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.data(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_request() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));
        let delay = Duration::from_millis(50);

        let page = key(1);
        let (a, b) = tokio::join!(
            cache.fetch::<usize>(&page, counting(&calls, delay)),
            cache.fetch::<usize>(&page, counting(&calls, delay)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data(), Some(&1));
        assert_eq!(b.data(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_fetch_separately() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch::<usize>(&key(2), counting(&calls, Duration::ZERO)).await;
        let page3 = cache.fetch::<usize>(&key(3), counting(&calls, Duration::ZERO)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(page3.data(), Some(&2));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_response_is_discarded() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let slow_then_fast = query_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    sleep(Duration::from_millis(100)).await;
                    Ok("old")
                } else {
                    sleep(Duration::from_millis(10)).await;
                    Ok("new")
                }
            }
        });

        let page = key(1);
        let (first, second) = tokio::join!(cache.fetch::<&str>(&page, slow_then_fast), async {
            sleep(Duration::from_millis(1)).await;
            cache.refetch::<&str>(&page).await
        });

        assert_eq!(second.data(), Some(&"new"));
        assert_eq!(first.data(), Some(&"new"));

        // Let the slow request finish; it must not overwrite the newer value.
        sleep(Duration::from_millis(200)).await;
        let state = cache.state::<&str>(&key(1));
        assert_eq!(state.data(), Some(&"new"));
        assert!(!state.is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_keeps_previous_data() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fails_second_time = query_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(7_u32)
                } else {
                    Err(Error::transport("connection reset"))
                }
            }
        });

        cache.fetch::<u32>(&key(1), fails_second_time).await;
        let state = cache.refetch::<u32>(&key(1)).await;

        assert_eq!(state.data(), Some(&7));
        assert!(state.is_error());
        assert!(!state.is_loading());
        assert!(state.error.unwrap().to_string().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_entry_is_retried_on_next_read() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fails_first_time = query_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::api(503, "Service Unavailable"))
                } else {
                    Ok(1_u32)
                }
            }
        });

        let failed = cache.fetch::<u32>(&key(1), Arc::clone(&fails_first_time)).await;
        assert!(failed.is_error());
        assert!(!failed.has_data());

        let recovered = cache.fetch::<u32>(&key(1), fails_first_time).await;
        assert_eq!(recovered.data(), Some(&1));
        assert!(!recovered.is_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_refetches_matching_entries() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch::<usize>(&key(1), counting(&calls, Duration::ZERO)).await;
        cache.fetch::<usize>(&key(2), counting(&calls, Duration::ZERO)).await;

        let invalidated = cache.invalidate(&key(1)).await;
        assert_eq!(invalidated, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.state::<usize>(&key(1)).data(), Some(&3));
        assert_eq!(cache.state::<usize>(&key(2)).data(), Some(&2));

        let invalidated = cache.invalidate(&QueryKey::named("transcripts")).await;
        assert_eq!(invalidated, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        assert_eq!(cache.invalidate(&QueryKey::named("sentimentTrends")).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_data_visible_while_refetching() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch::<usize>(&key(1), counting(&calls, Duration::from_millis(20)))
            .await;

        let refetch = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refetch::<usize>(&key(1)).await })
        };
        sleep(Duration::from_millis(5)).await;

        let during = cache.state::<usize>(&key(1));
        assert!(during.is_fetching);
        assert!(!during.is_loading());
        assert_eq!(during.data(), Some(&1));

        let after = refetch.await.unwrap();
        assert_eq!(after.data(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_state_before_first_response() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = {
            let cache = cache.clone();
            let query = counting(&calls, Duration::from_millis(20));
            tokio::spawn(async move { cache.fetch::<usize>(&key(1), query).await })
        };
        sleep(Duration::from_millis(5)).await;

        assert!(cache.state::<usize>(&key(1)).is_loading());
        assert_eq!(fetch.await.unwrap().data(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_entry_ignores_late_response() {
        let cache = QueryCache::new(HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = {
            let cache = cache.clone();
            let query = counting(&calls, Duration::from_millis(20));
            tokio::spawn(async move { cache.fetch::<usize>(&key(1), query).await })
        };
        sleep(Duration::from_millis(5)).await;
        assert!(cache.remove(&key(1)));

        let state = fetch.await.unwrap();
        assert!(!state.has_data());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_refetch_unknown_key_is_empty() {
        let cache = QueryCache::new(HOUR);
        let state = cache.refetch::<usize>(&key(9)).await;

        assert!(state.enabled);
        assert!(!state.has_data());
        assert!(!state.is_fetching);
    }

    #[test]
    fn test_disabled_state() {
        let state = QueryState::<u32>::disabled();
        assert!(!state.enabled);
        assert!(!state.is_loading());
        assert!(!state.has_data());
    }
}
