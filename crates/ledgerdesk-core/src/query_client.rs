// ── Shared query cache ──
//
// Key-addressed, type-erased cache with in-flight de-duplication and
// prefix invalidation. A `QueryClient` is cheap to clone and is handed to
// every data layer by the composition root; there is no global instance.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::error::{CoreError, ErrorKind};
use crate::key::QueryKey;

const EVENT_CHANNEL_SIZE: usize = 256;

type Erased = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<Erased, CoreError>>>;

// ── Configuration ───────────────────────────────────────────────────

/// Client-wide defaults applied when a query does not override them.
#[derive(Debug, Clone)]
pub struct QueryClientConfig {
    /// Extra attempts after the first failure.
    pub default_retry: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// How long a successful result is served without refetching.
    pub default_stale_time: Duration,
}

impl Default for QueryClientConfig {
    fn default() -> Self {
        Self {
            default_retry: 1,
            retry_delay: Duration::from_millis(500),
            default_stale_time: Duration::ZERO,
        }
    }
}

/// Per-call fetch tuning.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub retry: u32,
    pub stale_time: Duration,
}

// ── Events ──────────────────────────────────────────────────────────

/// Cache change notification, fanned out to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A key received fresh data.
    Updated(QueryKey),
    /// Every key under this prefix was marked stale.
    Invalidated(QueryKey),
    /// Every key under this prefix was evicted.
    Removed(QueryKey),
}

/// Proof that a mutation started at a given generation of its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket {
    scope: String,
    generation: u64,
}

impl MutationTicket {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ── Storage ─────────────────────────────────────────────────────────

struct CacheEntry {
    data: Erased,
    stale: bool,
    updated_at: Instant,
}

struct InFlight {
    id: u64,
    /// Set when the key is invalidated while this fetch is running.
    invalidated: Arc<AtomicBool>,
    future: SharedFetch,
}

struct Inner {
    config: QueryClientConfig,
    cache: DashMap<QueryKey, CacheEntry>,
    in_flight: DashMap<QueryKey, InFlight>,
    generations: DashMap<String, u64>,
    next_fetch_id: AtomicU64,
    events: broadcast::Sender<CacheEvent>,
}

/// Shared, process-wide query cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.inner.cache.len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryClientConfig::default())
    }
}

impl QueryClient {
    pub fn new(config: QueryClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Inner {
                config,
                cache: DashMap::new(),
                in_flight: DashMap::new(),
                generations: DashMap::new(),
                next_fetch_id: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn config(&self) -> &QueryClientConfig {
        &self.inner.config
    }

    /// Options built from the client defaults.
    pub fn default_fetch_options(&self) -> FetchOptions {
        FetchOptions {
            retry: self.inner.config.default_retry,
            stale_time: self.inner.config.default_stale_time,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    // ── Fetching ─────────────────────────────────────────────────────

    /// Return cached data for `key` if fresh, otherwise fetch it.
    ///
    /// Concurrent callers for the same key share one in-flight fetch. The
    /// fetch is driven by whichever waiters are polling it; when all of them
    /// are dropped it pauses and resumes with the next caller.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: FetchOptions,
        fetcher: F,
    ) -> Result<Arc<T>, CoreError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        if let Some(hit) = self.fresh_data::<T>(key, options.stale_time) {
            trace!(%key, "cache hit");
            return Ok(hit);
        }

        let shared = self.claim(key, options.retry, fetcher);
        let erased = shared.await?;
        downcast(key, erased)
    }

    fn fresh_data<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
    ) -> Option<Arc<T>> {
        let entry = self.inner.cache.get(key)?;
        if entry.stale || entry.updated_at.elapsed() >= stale_time {
            return None;
        }
        Arc::clone(&entry.data).downcast::<T>().ok()
    }

    fn claim<T, F, Fut>(&self, key: &QueryKey, retry: u32, fetcher: F) -> SharedFetch
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(%key, "joining in-flight fetch");
                existing.get().future.clone()
            }
            Entry::Vacant(slot) => {
                let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let invalidated = Arc::new(AtomicBool::new(false));
                debug!(%key, fetch = id, "starting fetch");

                let future = run_fetch(
                    Arc::downgrade(&self.inner),
                    key.clone(),
                    id,
                    Arc::clone(&invalidated),
                    retry,
                    self.inner.config.retry_delay,
                    fetcher,
                )
                .boxed()
                .shared();

                slot.insert(InFlight {
                    id,
                    invalidated,
                    future: future.clone(),
                });
                future
            }
        }
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.in_flight.contains_key(key)
    }

    // ── Direct cache access ──────────────────────────────────────────

    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entry = self.inner.cache.get(key)?;
        Arc::clone(&entry.data).downcast::<T>().ok()
    }

    /// Store `value` as fresh data for `key`.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        self.inner.cache.insert(
            key.clone(),
            CacheEntry {
                data: Arc::new(value),
                stale: false,
                updated_at: Instant::now(),
            },
        );
        let _ = self.inner.events.send(CacheEvent::Updated(key.clone()));
    }

    /// `None` when nothing is cached under `key`.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.inner.cache.get(key).map(|entry| entry.stale)
    }

    /// Keys currently cached, in no particular order.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.inner.cache.iter().map(|e| e.key().clone()).collect()
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Mark every key under `prefix` stale. Returns the number of cached
    /// entries matched.
    ///
    /// Idempotent: invalidating already-stale keys only re-marks them.
    /// Fetches already running for a matched key are detached so the next
    /// caller starts a new request, and their results land as stale.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut matched = 0;
        for mut entry in self.inner.cache.iter_mut() {
            if entry.key().starts_with(prefix) {
                entry.stale = true;
                matched += 1;
            }
        }

        self.inner.in_flight.retain(|key, fetch| {
            if key.starts_with(prefix) {
                fetch.invalidated.store(true, Ordering::Release);
                false
            } else {
                true
            }
        });

        debug!(%prefix, matched, "invalidated queries");
        let _ = self.inner.events.send(CacheEvent::Invalidated(prefix.clone()));
        matched
    }

    /// Evict every key under `prefix`. Returns the number removed.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let before = self.inner.cache.len();
        self.inner.cache.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.inner.cache.len());
        let _ = self.inner.events.send(CacheEvent::Removed(prefix.clone()));
        removed
    }

    pub fn clear(&self) {
        self.inner.cache.clear();
        self.inner.in_flight.clear();
    }

    // ── Mutation generations ─────────────────────────────────────────

    /// Start a mutation in `scope`, superseding any earlier ticket.
    pub fn begin_mutation(&self, scope: &str) -> MutationTicket {
        let mut generation = self.inner.generations.entry(scope.to_owned()).or_insert(0);
        *generation += 1;
        MutationTicket {
            scope: scope.to_owned(),
            generation: *generation,
        }
    }

    /// `false` once a newer mutation has started in the same scope.
    pub fn is_current(&self, ticket: &MutationTicket) -> bool {
        self.inner
            .generations
            .get(&ticket.scope)
            .is_some_and(|g| *g == ticket.generation)
    }
}

// ── Fetch driver ────────────────────────────────────────────────────

async fn run_fetch<T, F, Fut>(
    inner: Weak<Inner>,
    key: QueryKey,
    id: u64,
    invalidated: Arc<AtomicBool>,
    retry: u32,
    retry_delay: Duration,
    fetcher: F,
) -> Result<Erased, CoreError>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
{
    let result = fetch_with_retry(&key, retry, retry_delay, &fetcher).await;
    let data: Result<Erased, CoreError> = result.map(|value| Arc::new(value) as Erased);

    // Client dropped mid-fetch; hand the result to the waiters and stop.
    let Some(inner) = inner.upgrade() else {
        return data;
    };

    if let Ok(value) = &data {
        let stale = invalidated.load(Ordering::Acquire);
        let keep_newer = stale
            && inner
                .cache
                .get(&key)
                .is_some_and(|existing| !existing.stale);

        if keep_newer {
            debug!(%key, "discarding result superseded by a newer fetch");
        } else {
            inner.cache.insert(
                key.clone(),
                CacheEntry {
                    data: Arc::clone(value),
                    stale,
                    updated_at: Instant::now(),
                },
            );
            let _ = inner.events.send(CacheEvent::Updated(key.clone()));
        }
    }

    inner.in_flight.remove_if(&key, |_, fetch| fetch.id == id);
    data
}

async fn fetch_with_retry<T, F, Fut>(
    key: &QueryKey,
    retry: u32,
    retry_delay: Duration,
    fetcher: &F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retry && is_retryable(&e) => {
                attempt += 1;
                warn!(%key, attempt, error = %e, "fetch failed, retrying");
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Errors that a second attempt cannot fix are surfaced immediately.
fn is_retryable(err: &CoreError) -> bool {
    !matches!(
        err.kind(),
        ErrorKind::ClientValidation
            | ErrorKind::ServerValidation
            | ErrorKind::Authorization
            | ErrorKind::NotFound
    )
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, erased: Erased) -> Result<Arc<T>, CoreError> {
    erased.downcast::<T>().map_err(|_| {
        CoreError::Internal(format!(
            "cached value for {key} is not a {}",
            std::any::type_name::<T>()
        ))
    })
}
