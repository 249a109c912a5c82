// ── Query handles ──
//
// A `Query<T>` binds a key, a fetcher and an initial value. Its result
// always carries data: the initial shape until the first success, then
// the latest cached value (even after a later failure).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::error::CoreError;
use crate::key::QueryKey;
use crate::notify::Notifier;
use crate::query_client::{FetchOptions, QueryClient};

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

/// Per-handle query tuning. `None` fields fall back to client defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// A disabled query never hits the network.
    pub enabled: bool,
    /// Toast the failure once the retry budget is spent.
    pub show_message: bool,
    pub retry: Option<u32>,
    pub stale_time: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            show_message: true,
            retry: None,
            stale_time: None,
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn show_message(mut self, show: bool) -> Self {
        self.show_message = show;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum QueryStatus {
    /// Disabled, or not fetched yet.
    Idle,
    Success,
    Error,
}

/// Snapshot returned by a query handle.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Arc<T>,
    pub status: QueryStatus,
    pub error: Option<CoreError>,
}

impl<T> QueryResult<T> {
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// The display message for a failed fetch.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(CoreError::message)
    }
}

/// A cached read bound to one query key.
pub struct Query<T> {
    client: QueryClient,
    notifier: Arc<dyn Notifier>,
    key: QueryKey,
    fetcher: Fetcher<T>,
    initial: Arc<T>,
    options: QueryOptions,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            notifier: Arc::clone(&self.notifier),
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            initial: Arc::clone(&self.initial),
            options: self.options,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T> Query<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(
        client: QueryClient,
        notifier: Arc<dyn Notifier>,
        key: QueryKey,
        initial: T,
        options: QueryOptions,
        fetcher: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        Self {
            client,
            notifier,
            key,
            fetcher: Arc::new(move || -> BoxFuture<'static, Result<T, CoreError>> {
                Box::pin(fetcher())
            }),
            initial: Arc::new(initial),
            options,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    /// Cached state without touching the network.
    pub fn current(&self) -> QueryResult<T> {
        match self.client.get_query_data::<T>(&self.key) {
            Some(data) => QueryResult {
                data,
                status: QueryStatus::Success,
                error: None,
            },
            None => self.idle(),
        }
    }

    fn idle(&self) -> QueryResult<T> {
        QueryResult {
            data: Arc::clone(&self.initial),
            status: QueryStatus::Idle,
            error: None,
        }
    }

    /// Resolve the query: served from cache while fresh, fetched otherwise.
    pub async fn fetch(&self) -> QueryResult<T> {
        if !self.options.enabled {
            debug!(key = %self.key, "query disabled");
            return self.current_or_idle();
        }

        let defaults = self.client.default_fetch_options();
        let options = FetchOptions {
            retry: self.options.retry.unwrap_or(defaults.retry),
            stale_time: self.options.stale_time.unwrap_or(defaults.stale_time),
        };

        let fetcher = Arc::clone(&self.fetcher);
        match self
            .client
            .fetch_query::<T, _, _>(&self.key, options, move || fetcher())
            .await
        {
            Ok(data) => QueryResult {
                data,
                status: QueryStatus::Success,
                error: None,
            },
            Err(err) => {
                if self.options.show_message {
                    self.notifier.error(&err.message());
                }
                let data = self
                    .client
                    .get_query_data::<T>(&self.key)
                    .unwrap_or_else(|| Arc::clone(&self.initial));
                QueryResult {
                    data,
                    status: QueryStatus::Error,
                    error: Some(err),
                }
            }
        }
    }

    /// Mark this key stale and fetch again.
    pub async fn refetch(&self) -> QueryResult<T> {
        self.client.invalidate_queries(&self.key);
        self.fetch().await
    }

    fn current_or_idle(&self) -> QueryResult<T> {
        let mut result = self.current();
        if result.status == QueryStatus::Success {
            return result;
        }
        result.status = QueryStatus::Idle;
        result
    }
}
