// ── Runtime connection configuration ──
//
// Describes how to reach the ledger API. Carries credentials and tuning
// but never touches disk; the CLI builds a `ClientConfig` from its profile
// and hands it to `Session`.

use std::path::PathBuf;
use std::time::Duration;

use ledgerdesk_api::{ReconnectConfig, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::query_client::QueryClientConfig;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Only for local test servers.
    DangerAcceptInvalid,
}

/// Everything a `Session` needs to talk to one ledger deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin, e.g. `https://ledger.example.org`. `/api/v1/` is appended.
    pub api_url: Url,
    /// WebSocket endpoint for topic events. `None` disables real-time.
    pub realtime_url: Option<Url>,
    /// Branch whose topics are subscribed.
    pub branch_id: Option<String>,
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    pub timeout: Duration,
    /// Extra attempts for failed reads.
    pub retry: u32,
    pub retry_delay: Duration,
    /// How long a read is served from cache without refetching.
    pub stale_time: Duration,
    /// Backoff for the real-time channel.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            realtime_url: None,
            branch_id: None,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            retry: 1,
            retry_delay: Duration::from_millis(500),
            stale_time: Duration::ZERO,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        let transport = TransportConfig {
            tls,
            timeout: self.timeout,
            token: None,
        };
        match &self.token {
            Some(token) => transport.with_token(token.clone()),
            None => transport,
        }
    }

    pub(crate) fn query_client_config(&self) -> QueryClientConfig {
        QueryClientConfig {
            default_retry: self.retry,
            retry_delay: self.retry_delay,
            default_stale_time: self.stale_time,
        }
    }
}
