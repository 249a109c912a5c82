// ── Mutation runner ──
//
// Wraps a write call with the behavior every entity form and table relies
// on: pending tracking, error capture, success/failure toasts, caller
// callbacks, and cache invalidation on success. Mutations never retry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;
use futures_util::future::BoxFuture;
use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::key::QueryKey;
use crate::notify::Notifier;
use crate::query_client::{MutationTicket, QueryClient};

type MutationFn<V, T> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

/// Invalidation callback: client, submitted variables, and the resulting
/// record when the mutation produced one. Runs after every success,
/// current ticket or not.
pub type InvalidateFn<V, T> = Arc<dyn Fn(&QueryClient, &V, Option<&T>) + Send + Sync>;

/// Writes a fresh result into the cache. Only runs while the mutation's
/// ticket is still current.
pub type CacheWriteFn<V, T> = Arc<dyn Fn(&QueryClient, &V, &T) + Send + Sync>;

type SuccessMessageFn<V, T> = Arc<dyn Fn(&V, &T) -> String + Send + Sync>;

type TicketScopeFn<V> = Arc<dyn Fn(&V) -> String + Send + Sync>;

// ── Options ─────────────────────────────────────────────────────────

/// Caller hooks for one mutation handle.
pub struct MutationOptions<V, T> {
    on_success: Option<Arc<dyn Fn(&T, &V) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&str, &CoreError) + Send + Sync>>,
    show_message: bool,
}

impl<V, T> Default for MutationOptions<V, T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            show_message: true,
        }
    }
}

impl<V, T> Clone for MutationOptions<V, T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            show_message: self.show_message,
        }
    }
}

impl<V, T> fmt::Debug for MutationOptions<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOptions")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("show_message", &self.show_message)
            .finish()
    }
}

impl<V, T> MutationOptions<V, T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success(mut self, f: impl Fn(&T, &V) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Receives the display message and the structured error.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str, &CoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn show_message(mut self, show: bool) -> Self {
        self.show_message = show;
        self
    }
}

/// The generic list invalidation: `[base, "paginated"]` and `[base, "all"]`.
pub fn invalidate_lists<V, T>(
    base_key: &str,
) -> impl Fn(&QueryClient, &V, Option<&T>) + Send + Sync + 'static {
    let paginated = QueryKey::new(base_key).with("paginated");
    let all = QueryKey::new(base_key).with("all");
    move |client: &QueryClient, _: &V, _: Option<&T>| {
        client.invalidate_queries(&paginated);
        client.invalidate_queries(&all);
    }
}

// ── Mutation handle ─────────────────────────────────────────────────

struct MutationState {
    pending: AtomicUsize,
    error: ArcSwapOption<CoreError>,
}

/// Decrements the pending counter even if the caller drops the future.
struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A reusable write operation with variables `V` and result `T`.
pub struct Mutation<V, T> {
    client: QueryClient,
    notifier: Arc<dyn Notifier>,
    scope: String,
    mutation_fn: MutationFn<V, T>,
    invalidate: Option<InvalidateFn<V, T>>,
    cache_write: Option<CacheWriteFn<V, T>>,
    success_message: Option<SuccessMessageFn<V, T>>,
    ticket_scope: Option<TicketScopeFn<V>>,
    options: MutationOptions<V, T>,
    state: Arc<MutationState>,
}

impl<V, T> Clone for Mutation<V, T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            notifier: Arc::clone(&self.notifier),
            scope: self.scope.clone(),
            mutation_fn: Arc::clone(&self.mutation_fn),
            invalidate: self.invalidate.clone(),
            cache_write: self.cache_write.clone(),
            success_message: self.success_message.clone(),
            ticket_scope: self.ticket_scope.clone(),
            options: self.options.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<V, T> fmt::Debug for Mutation<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("scope", &self.scope)
            .field("pending", &self.state.pending.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<V, T> Mutation<V, T>
where
    V: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(
        client: QueryClient,
        notifier: Arc<dyn Notifier>,
        scope: impl Into<String>,
        mutation_fn: F,
    ) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        Self {
            client,
            notifier,
            scope: scope.into(),
            mutation_fn: Arc::new(move |v| -> BoxFuture<'static, Result<T, CoreError>> {
                Box::pin(mutation_fn(v))
            }),
            invalidate: None,
            cache_write: None,
            success_message: None,
            ticket_scope: None,
            options: MutationOptions::default(),
            state: Arc::new(MutationState {
                pending: AtomicUsize::new(0),
                error: ArcSwapOption::empty(),
            }),
        }
    }

    #[must_use]
    pub fn with_invalidation(
        mut self,
        invalidate: impl Fn(&QueryClient, &V, Option<&T>) + Send + Sync + 'static,
    ) -> Self {
        self.invalidate = Some(Arc::new(invalidate));
        self
    }

    #[must_use]
    pub fn with_cache_write(
        mut self,
        write: impl Fn(&QueryClient, &V, &T) + Send + Sync + 'static,
    ) -> Self {
        self.cache_write = Some(Arc::new(write));
        self
    }

    #[must_use]
    pub fn with_success_message(
        mut self,
        message: impl Fn(&V, &T) -> String + Send + Sync + 'static,
    ) -> Self {
        self.success_message = Some(Arc::new(message));
        self
    }

    /// Narrow generation tickets to a per-call scope, e.g. one record id.
    /// Without this every call shares the handle's scope.
    #[must_use]
    pub fn with_ticket_scope(mut self, scope: impl Fn(&V) -> String + Send + Sync + 'static) -> Self {
        self.ticket_scope = Some(Arc::new(scope));
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: MutationOptions<V, T>) -> Self {
        self.options = options;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::Acquire) > 0
    }

    /// Error from the most recent failed call, cleared on the next call.
    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.state.error.load_full()
    }

    pub fn reset(&self) {
        self.state.error.store(None);
    }

    /// Run the mutation once.
    #[instrument(skip_all, fields(scope = %self.scope))]
    pub async fn mutate(&self, variables: V) -> Result<T, CoreError> {
        let scope = self
            .ticket_scope
            .as_ref()
            .map_or_else(|| self.scope.clone(), |f| f(&variables));
        let ticket = self.client.begin_mutation(&scope);
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        let _pending = PendingGuard(&self.state.pending);
        self.state.error.store(None);

        match (self.mutation_fn)(variables.clone()).await {
            Ok(result) => {
                self.settle_success(&ticket, &variables, &result);
                Ok(result)
            }
            Err(err) => {
                self.settle_error(&err);
                Err(err)
            }
        }
    }

    fn settle_success(&self, ticket: &MutationTicket, variables: &V, result: &T) {
        if let Some(write) = &self.cache_write {
            if self.client.is_current(ticket) {
                write(&self.client, variables, result);
            } else {
                debug!(
                    generation = ticket.generation(),
                    "newer mutation in flight, skipping cache write"
                );
            }
        }

        if let Some(invalidate) = &self.invalidate {
            invalidate(&self.client, variables, Some(result));
        }

        if self.options.show_message {
            if let Some(message) = &self.success_message {
                self.notifier.success(&message(variables, result));
            }
        }

        if let Some(on_success) = &self.options.on_success {
            on_success(result, variables);
        }
    }

    fn settle_error(&self, err: &CoreError) {
        let message = err.message();
        debug!(error = %err, "mutation failed");
        self.state.error.store(Some(Arc::new(err.clone())));

        if self.options.show_message {
            self.notifier.error(&message);
        }

        if let Some(on_error) = &self.options.on_error {
            on_error(&message, err);
        }
    }
}
