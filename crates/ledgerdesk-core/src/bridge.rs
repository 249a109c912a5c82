// ── Real-time invalidation bridge ──
//
// Routes server-pushed topic events to registered callbacks, usually
// `invalidate_queries` on a key family. Several topics may converge on one
// key; the cache's idempotent invalidation absorbs the duplicates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use ledgerdesk_api::{RealtimeHandle, Topic, TopicEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::key::QueryKey;
use crate::query_client::QueryClient;

type TopicCallback = Arc<dyn Fn(&TopicEvent) + Send + Sync>;

struct Registry {
    topics: DashMap<Topic, Vec<(u64, TopicCallback)>>,
    next_id: AtomicU64,
    /// Set once a live connection is attached; topic changes are mirrored to it.
    realtime: ArcSwapOption<RealtimeHandle>,
}

/// Topic → callback router over a stream of [`TopicEvent`]s.
#[derive(Clone)]
pub struct InvalidationBridge {
    registry: Arc<Registry>,
    client: QueryClient,
    cancel: CancellationToken,
}

impl std::fmt::Debug for InvalidationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationBridge")
            .field("topics", &self.registry.topics.len())
            .field("realtime", &self.registry.realtime.load().is_some())
            .finish_non_exhaustive()
    }
}

impl InvalidationBridge {
    /// A bridge with no event source yet. Events arrive through
    /// [`dispatch`](Self::dispatch) until a connection is [attached](Self::attach).
    pub fn new(client: QueryClient) -> Self {
        Self::build(client, CancellationToken::new())
    }

    /// Route events from any broadcast source.
    pub fn from_receiver(
        client: QueryClient,
        events: broadcast::Receiver<Arc<TopicEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        let bridge = Self::build(client, cancel);
        bridge.spawn_dispatch(events);
        bridge
    }

    fn build(client: QueryClient, cancel: CancellationToken) -> Self {
        Self {
            registry: Arc::new(Registry {
                topics: DashMap::new(),
                next_id: AtomicU64::new(0),
                realtime: ArcSwapOption::empty(),
            }),
            client,
            cancel,
        }
    }

    /// Start routing events from a live connection. Topics registered
    /// before this call are subscribed on the server now; later ones as
    /// they are registered.
    pub fn attach(&self, realtime: RealtimeHandle) {
        let events = realtime.subscribe();
        // Store first: a concurrent first subscriber then sees the handle or is replayed.
        self.registry.realtime.store(Some(Arc::new(realtime)));
        if let Some(realtime) = &*self.registry.realtime.load() {
            for entry in &self.registry.topics {
                realtime.subscribe_topic(entry.key());
            }
        }
        debug!(topics = self.registry.topics.len(), "real-time source attached");
        self.spawn_dispatch(events);
    }

    /// Forget the live connection. Callbacks stay registered.
    pub fn detach(&self) {
        self.registry.realtime.store(None);
    }

    pub fn is_attached(&self) -> bool {
        self.registry.realtime.load().is_some()
    }

    fn spawn_dispatch(&self, mut events: broadcast::Receiver<Arc<TopicEvent>>) {
        let bridge = self.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            bridge.dispatch(&event);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "invalidation bridge lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("invalidation bridge stopped");
        });
    }

    /// Register `callback` for `topic`. Dropping the returned guard removes it.
    pub fn subscribe(
        &self,
        topic: Topic,
        callback: impl Fn(&TopicEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entry = self.registry.topics.entry(topic.clone()).or_default();
        let first = entry.is_empty();
        entry.push((id, Arc::new(callback)));
        drop(entry);

        if first {
            if let Some(realtime) = &*self.registry.realtime.load() {
                realtime.subscribe_topic(&topic);
            }
        }
        debug!(%topic, "subscribed");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            topic,
            id,
        }
    }

    /// Invalidate `key` whenever any of `topics` fires.
    pub fn invalidate_on(
        &self,
        topics: impl IntoIterator<Item = Topic>,
        key: QueryKey,
    ) -> Vec<Subscription> {
        topics
            .into_iter()
            .map(|topic| {
                let client = self.client.clone();
                let key = key.clone();
                self.subscribe(topic, move |event| {
                    trace!(topic = %event.topic, %key, "topic invalidates key");
                    client.invalidate_queries(&key);
                })
            })
            .collect()
    }

    /// Run every callback registered for `event.topic`. Returns how many ran.
    pub fn dispatch(&self, event: &TopicEvent) -> usize {
        // Clone the callbacks out so none run under the map lock.
        let callbacks: Vec<TopicCallback> = match self.registry.topics.get(&event.topic) {
            Some(entry) => entry.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.registry.topics.get(topic).map_or(0, |entry| entry.len())
    }

    /// Stop the dispatch tasks. Registered callbacks stay in place.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Guard for one topic callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Registry>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic.to_string())
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let now_empty = match registry.topics.get_mut(&self.topic) {
            Some(mut entry) => {
                entry.retain(|(id, _)| *id != self.id);
                entry.is_empty()
            }
            None => false,
        };

        if now_empty {
            registry.topics.remove_if(&self.topic, |_, callbacks| callbacks.is_empty());
            if let Some(realtime) = &*registry.realtime.load() {
                realtime.unsubscribe_topic(&self.topic);
            }
            debug!(topic = %self.topic, "unsubscribed");
        }
    }
}
