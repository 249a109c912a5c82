// ── Session ──
//
// Composition root for one ledger deployment. Owns the shared HTTP
// client, the query cache, the notifier and the invalidation bridge, and
// hands out data layers that all share them. The bridge lives as long as
// the session; a real-time connection is attached to it on demand.

use std::sync::Arc;

use ledgerdesk_api::{ApiClient, RealtimeHandle, RealtimeStatus, Topic};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bridge::InvalidationBridge;
use crate::config::ClientConfig;
use crate::data_layer::{DataLayer, DataLayerConfig};
use crate::error::CoreError;
use crate::model::{Holiday, HolidayRequest, Record, Voucher, VoucherRequest};
use crate::notify::Notifier;
use crate::query_client::QueryClient;

/// Real-time connection state, observable through [`Session::connection_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

impl From<RealtimeStatus> for ConnectionState {
    fn from(status: RealtimeStatus) -> Self {
        match status {
            RealtimeStatus::Connecting => Self::Connecting,
            RealtimeStatus::Connected => Self::Connected,
            RealtimeStatus::Reconnecting { attempt } => Self::Reconnecting { attempt },
            RealtimeStatus::Failed => Self::Failed,
            RealtimeStatus::Closed => Self::Disconnected,
        }
    }
}

struct SessionInner {
    config: ClientConfig,
    api: ApiClient,
    queries: QueryClient,
    notifier: Arc<dyn Notifier>,
    connection_state: Arc<watch::Sender<ConnectionState>>,
    bridge: InvalidationBridge,
    realtime: Mutex<Option<RealtimeHandle>>,
    cancel: CancellationToken,
}

/// Cheaply cloneable handle to a configured client.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api", &self.inner.api)
            .field("state", &*self.inner.connection_state.borrow())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self, CoreError> {
        let api = ApiClient::new(config.api_url.as_str(), &config.transport())?;
        Ok(Self::with_api(config, api, notifier))
    }

    /// Build around an existing client (tests point this at a mock server).
    pub fn with_api(config: ClientConfig, api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        let queries = QueryClient::new(config.query_client_config());
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let bridge = InvalidationBridge::new(queries.clone());

        Self {
            inner: Arc::new(SessionInner {
                config,
                api,
                queries,
                notifier,
                connection_state: Arc::new(connection_state),
                bridge,
                realtime: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn query_client(&self) -> &QueryClient {
        &self.inner.queries
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.inner.notifier)
    }

    /// Data layer for one entity, sharing this session's client and cache.
    pub fn data_layer<T, R>(&self, config: DataLayerConfig) -> DataLayer<T, R>
    where
        T: Record + DeserializeOwned + Clone + Send + Sync + 'static,
        R: Serialize + Clone + Send + Sync + 'static,
    {
        DataLayer::new(
            self.inner.api.clone(),
            self.inner.queries.clone(),
            Arc::clone(&self.inner.notifier),
            config,
        )
    }

    pub fn holidays(&self) -> DataLayer<Holiday, HolidayRequest> {
        self.data_layer(DataLayerConfig::new("holiday", "holiday"))
    }

    pub fn vouchers(&self) -> DataLayer<Voucher, VoucherRequest> {
        self.data_layer(DataLayerConfig::new("voucher", "voucher").with_label("Voucher"))
    }

    // ── Real-time ────────────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// The session's one invalidation bridge. Subscriptions made before
    /// [`connect_realtime`](Self::connect_realtime) carry over to the live
    /// connection.
    pub fn bridge(&self) -> InvalidationBridge {
        self.inner.bridge.clone()
    }

    /// Open the real-time channel and attach it to the bridge. A no-op when
    /// already open. The connection state moves to `Connected` only once
    /// the handshake succeeds.
    pub async fn connect_realtime(&self) -> Result<InvalidationBridge, CoreError> {
        let mut slot = self.inner.realtime.lock().await;
        if slot.is_some() {
            return Ok(self.bridge());
        }

        let Some(url) = self.inner.config.realtime_url.clone() else {
            return Err(CoreError::Config {
                message: "no real-time URL configured".into(),
            });
        };

        self.inner.connection_state.send_replace(ConnectionState::Connecting);
        let cancel = self.inner.cancel.child_token();
        let handle = match RealtimeHandle::connect(
            url,
            self.inner.config.token.clone(),
            self.inner.config.reconnect.clone(),
            cancel.clone(),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                return Err(e.into());
            }
        };

        self.spawn_state_forwarder(handle.status(), cancel);
        self.inner.bridge.attach(handle.clone());
        *slot = Some(handle);
        info!("real-time channel started");
        Ok(self.bridge())
    }

    /// Mirror the connection loop's status into the session state until
    /// it fails or the session disconnects.
    fn spawn_state_forwarder(
        &self,
        mut status: watch::Receiver<RealtimeStatus>,
        cancel: CancellationToken,
    ) {
        let state = Arc::clone(&self.inner.connection_state);
        tokio::spawn(async move {
            loop {
                let current = ConnectionState::from(*status.borrow_and_update());
                state.send_replace(current);
                if current == ConnectionState::Failed {
                    break;
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("connection state forwarder stopped");
        });
    }

    /// Lifecycle topics for `entity` in the configured branch.
    pub fn branch_topics(&self, entity: &str) -> Result<Vec<Topic>, CoreError> {
        let Some(branch) = &self.inner.config.branch_id else {
            return Err(CoreError::Config {
                message: "no branch configured".into(),
            });
        };
        Ok(Topic::lifecycle(entity, branch))
    }

    /// Stop background tasks and forget the real-time connection. Real-time
    /// cannot be reopened on this session afterwards.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.realtime.lock().await.take() {
            self.inner.bridge.detach();
            self.inner.bridge.shutdown();
            handle.shutdown();
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("session disconnected");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    fn session(config: ClientConfig) -> Session {
        Session::new(config, Arc::new(RecordingNotifier::new())).unwrap()
    }

    #[tokio::test]
    async fn realtime_requires_url() {
        let session = session(ClientConfig::new("https://ledger.example.org".parse().unwrap()));
        let err = session.connect_realtime().await.unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
        assert_eq!(*session.connection_state().borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn realtime_rejects_http_scheme() {
        let mut config = ClientConfig::new("https://ledger.example.org".parse().unwrap());
        config.realtime_url = Some("https://ledger.example.org/ws".parse().unwrap());
        let session = session(config);

        assert!(session.connect_realtime().await.is_err());
        assert_eq!(*session.connection_state().borrow(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn rejected_handshake_never_reports_connected() {
        let server = wiremock::MockServer::start().await;
        let mut config = ClientConfig::new("https://ledger.example.org".parse().unwrap());
        config.realtime_url = Some(format!("ws://{}/ws", server.address()).parse().unwrap());
        config.reconnect.max_retries = Some(0);
        let session = session(config);

        let mut state = session.connection_state();
        session.connect_realtime().await.unwrap();
        assert_ne!(*state.borrow(), ConnectionState::Connected);

        let seen = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            state.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed)),
        )
        .await
        .unwrap()
        .map(|s| *s)
        .unwrap();
        assert_eq!(seen, ConnectionState::Failed);
    }

    #[test]
    fn bridge_handle_is_shared() {
        let session = session(ClientConfig::new("https://ledger.example.org".parse().unwrap()));
        let topic = Topic::lifecycle("holiday", "b1").remove(0);
        let _sub = session.bridge().subscribe(topic.clone(), |_| {});
        assert_eq!(session.bridge().subscriber_count(&topic), 1);
    }

    #[test]
    fn realtime_status_maps_onto_connection_state() {
        assert_eq!(
            ConnectionState::from(RealtimeStatus::Reconnecting { attempt: 2 }),
            ConnectionState::Reconnecting { attempt: 2 }
        );
        assert_eq!(
            ConnectionState::from(RealtimeStatus::Closed),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn branch_topics_use_configured_branch() {
        let mut config = ClientConfig::new("https://ledger.example.org".parse().unwrap());
        config.branch_id = Some("b7".into());
        let topics = session(config).branch_topics("holiday").unwrap();
        let names: Vec<String> = topics.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "holiday.created.branch.b7",
                "holiday.updated.branch.b7",
                "holiday.deleted.branch.b7"
            ]
        );
    }

    #[test]
    fn data_layers_share_one_cache() {
        let session = session(ClientConfig::new("https://ledger.example.org".parse().unwrap()));
        let holidays = session.holidays();
        holidays
            .query_client()
            .set_query_data(&holidays.all_key(), Vec::<Holiday>::new());
        assert!(session
            .query_client()
            .get_query_data::<Vec<Holiday>>(&holidays.all_key())
            .is_some());
        assert_eq!(holidays.api().base_url().as_str(), "https://ledger.example.org/api/v1/");
    }
}
