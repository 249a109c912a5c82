//! Real-time topic stream with auto-reconnect.
//!
//! The server pushes notifications on topics of the form
//! `<entity>.<created|updated|deleted>.branch.<branchId>`. Topics are
//! modelled as a typed [`Topic`] and only rendered to the wire string when a
//! subscribe frame is sent. Received notifications are fanned out through a
//! [`tokio::sync::broadcast`] channel; reconnection uses exponential backoff
//! with jitter and re-sends every active subscription.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerdesk_api::realtime::{EventKind, RealtimeHandle, ReconnectConfig, Topic};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("wss://erp.example.com/ws")?;
//! let handle = RealtimeHandle::connect(url, None, ReconnectConfig::default(), cancel.clone())?;
//!
//! handle.subscribe_topic(&Topic::branch("holiday", EventKind::Created, "42"));
//! let mut rx = handle.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", event.topic);
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── Topic ────────────────────────────────────────────────────────────

/// Lifecycle event a topic announces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// Scope a topic is published in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Branch(String),
}

/// `entity.event.branch.id`, typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    pub entity: String,
    pub event: EventKind,
    pub scope: Scope,
}

impl Topic {
    pub fn branch(entity: impl Into<String>, event: EventKind, branch_id: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            event,
            scope: Scope::Branch(branch_id.into()),
        }
    }

    /// Created, updated, and deleted topics for one entity in one branch.
    pub fn lifecycle(entity: &str, branch_id: &str) -> Vec<Self> {
        [EventKind::Created, EventKind::Updated, EventKind::Deleted]
            .into_iter()
            .map(|event| Self::branch(entity, event, branch_id))
            .collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Branch(id) => write!(f, "{}.{}.branch.{id}", self.entity, self.event),
        }
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidTopic(s.to_owned());
        let parts: Vec<&str> = s.split('.').collect();
        let [entity, event, scope, id] = parts.as_slice() else {
            return Err(invalid());
        };
        if entity.is_empty() || id.is_empty() || *scope != "branch" {
            return Err(invalid());
        }
        let event = EventKind::from_str(event).map_err(|_| invalid())?;
        Ok(Self::branch(*entity, event, *id))
    }
}

impl Serialize for Topic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Frames ───────────────────────────────────────────────────────────

/// A notification received on a subscribed topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEvent {
    pub topic: Topic,
    /// Not interpreted; invalidation only needs the topic.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ControlFrame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── RealtimeStatus ───────────────────────────────────────────────────

/// Where the background connection loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeStatus {
    /// Opening a socket; nothing has been received yet.
    Connecting,
    /// Handshake completed and subscriptions replayed.
    Connected,
    /// Waiting out the backoff before retry number `attempt`.
    Reconnecting { attempt: u32 },
    /// `max_retries` exhausted. The loop has stopped.
    Failed,
    /// Shut down on request.
    Closed,
}

// ── RealtimeHandle ───────────────────────────────────────────────────

/// Handle to a running real-time connection.
///
/// Cheap to clone. Call [`shutdown`](Self::shutdown) (or cancel the token
/// passed to [`connect`](Self::connect)) to tear down the background task.
#[derive(Debug, Clone)]
pub struct RealtimeHandle {
    event_tx: broadcast::Sender<Arc<TopicEvent>>,
    control_tx: mpsc::UnboundedSender<ControlFrame>,
    status: watch::Receiver<RealtimeStatus>,
    cancel: CancellationToken,
}

impl RealtimeHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        ws_url: Url,
        token: Option<SecretString>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        match ws_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::RealtimeConnect(format!(
                    "unsupported scheme '{other}', expected ws or wss"
                )));
            }
        }

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(RealtimeStatus::Connecting);

        let task = RealtimeLoop {
            url: ws_url,
            token,
            reconnect,
            cancel: cancel.clone(),
            event_tx: event_tx.clone(),
            control_rx,
            status_tx,
            topics: BTreeSet::new(),
        };
        tokio::spawn(task.run());

        Ok(Self {
            event_tx,
            control_tx,
            status,
            cancel,
        })
    }

    /// Follow the connection loop's status. Starts at `Connecting`.
    pub fn status(&self) -> watch::Receiver<RealtimeStatus> {
        self.status.clone()
    }

    /// New receiver for every topic event from now on.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TopicEvent>> {
        self.event_tx.subscribe()
    }

    /// Ask the server to start pushing `topic`. Idempotent.
    pub fn subscribe_topic(&self, topic: &Topic) {
        let _ = self.control_tx.send(ControlFrame::Subscribe {
            topic: topic.to_string(),
        });
    }

    /// Ask the server to stop pushing `topic`.
    pub fn unsubscribe_topic(&self, topic: &Topic) {
        let _ = self.control_tx.send(ControlFrame::Unsubscribe {
            topic: topic.to_string(),
        });
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

struct RealtimeLoop {
    url: Url,
    token: Option<SecretString>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<Arc<TopicEvent>>,
    control_rx: mpsc::UnboundedReceiver<ControlFrame>,
    status_tx: watch::Sender<RealtimeStatus>,
    /// Active subscriptions, re-sent after every reconnect.
    topics: BTreeSet<String>,
}

/// Why a single connection ended without an error.
enum Disconnect {
    Remote,
    Shutdown,
}

impl RealtimeLoop {
    /// Main loop: connect → read → on error, backoff → reconnect.
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            let cancel = self.cancel.clone();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.connect_and_read() => result,
            };

            match result {
                Ok(Disconnect::Shutdown) => break,
                Ok(Disconnect::Remote) => {
                    tracing::info!("real-time channel disconnected cleanly, reconnecting");
                    attempt = 0;
                    self.status_tx.send_replace(RealtimeStatus::Connecting);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "real-time channel error");

                    if let Some(max) = self.reconnect.max_retries {
                        if attempt >= max {
                            tracing::error!(
                                max_retries = max,
                                "real-time reconnection limit reached, giving up"
                            );
                            self.status_tx.send_replace(RealtimeStatus::Failed);
                            return;
                        }
                    }

                    self.status_tx
                        .send_replace(RealtimeStatus::Reconnecting { attempt: attempt + 1 });
                    let delay = calculate_backoff(attempt, &self.reconnect);
                    tracing::info!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        attempt,
                        "waiting before reconnect"
                    );

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                    self.status_tx.send_replace(RealtimeStatus::Connecting);
                }
            }
        }

        self.status_tx.send_replace(RealtimeStatus::Closed);
        tracing::debug!("real-time loop exiting");
    }

    /// Establish one connection, replay subscriptions, then read until it drops.
    async fn connect_and_read(&mut self) -> Result<Disconnect, Error> {
        tracing::info!(url = %self.url, "connecting to real-time channel");

        let uri: tungstenite::http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::RealtimeConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(token) = &self.token {
            request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::RealtimeConnect(e.to_string()))?;

        tracing::info!(topics = self.topics.len(), "real-time channel connected");

        let (mut write, mut read) = ws_stream.split();

        for topic in &self.topics {
            let frame = encode_control(&ControlFrame::Subscribe {
                topic: topic.clone(),
            })?;
            write
                .send(tungstenite::Message::text(frame))
                .await
                .map_err(|e| Error::RealtimeConnect(e.to_string()))?;
        }
        self.status_tx.send_replace(RealtimeStatus::Connected);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(Disconnect::Shutdown),
                control = self.control_rx.recv() => {
                    let Some(control) = control else {
                        // Every handle was dropped.
                        return Ok(Disconnect::Shutdown);
                    };
                    if !self.apply_control(&control) {
                        continue;
                    }
                    let frame = encode_control(&control)?;
                    write
                        .send(tungstenite::Message::text(frame))
                        .await
                        .map_err(|e| Error::RealtimeConnect(e.to_string()))?;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            parse_and_broadcast(text.as_str(), &self.event_tx);
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            if let Some(cf) = frame {
                                tracing::info!(
                                    code = %cf.code,
                                    reason = %cf.reason,
                                    "real-time close frame received"
                                );
                            }
                            return Ok(Disconnect::Remote);
                        }
                        Some(Err(e)) => return Err(Error::RealtimeConnect(e.to_string())),
                        None => {
                            tracing::info!("real-time stream ended");
                            return Ok(Disconnect::Remote);
                        }
                        Some(Ok(_)) => {
                            // Ping/Pong/Binary -- tungstenite answers pings itself
                        }
                    }
                }
            }
        }
    }

    /// Track a control frame. Returns `false` when it changes nothing.
    fn apply_control(&mut self, control: &ControlFrame) -> bool {
        match control {
            ControlFrame::Subscribe { topic } => self.topics.insert(topic.clone()),
            ControlFrame::Unsubscribe { topic } => self.topics.remove(topic),
        }
    }
}

fn encode_control(frame: &ControlFrame) -> Result<String, Error> {
    serde_json::to_string(frame).map_err(|e| Error::Encoding(e.to_string()))
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame and broadcast it if it names a well-formed topic.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<TopicEvent>>) {
    match serde_json::from_str::<TopicEvent>(text) {
        Ok(event) => {
            tracing::trace!(topic = %event.topic, "real-time event");
            // No receivers right now is fine.
            let _ = event_tx.send(Arc::new(event));
        }
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unrecognized real-time frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
