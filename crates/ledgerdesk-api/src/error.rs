use std::collections::BTreeMap;

use thiserror::Error;

/// Field name -> validation messages, as returned in the `errors` envelope.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Top-level error type for the `ledgerdesk-api` crate.
///
/// Every non-2xx response is classified by status into one of the
/// HTTP variants below. `ledgerdesk-core` folds these into the
/// single-message taxonomy the UI layer consumes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Record id that cannot stand as a single path segment.
    #[error("Invalid record id '{0}'")]
    InvalidId(String),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP status classes ─────────────────────────────────────────
    /// 400 / 422 with a message and optional field errors.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: FieldErrors,
        status: u16,
    },

    /// 401 -- token missing, expired, or rejected.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// 403 -- authenticated but not permitted.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// 404.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// 409.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Any 5xx.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Filter/sort descriptor could not be encoded or decoded.
    #[error("Descriptor encoding error: {0}")]
    Encoding(String),

    // ── Real-time ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("Real-time connection failed: {0}")]
    RealtimeConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("Real-time channel closed (code {code}): {reason}")]
    RealtimeClosed { code: u16, reason: String },

    /// Topic string did not match `entity.event.branch.id`.
    #[error("Invalid topic '{0}'")]
    InvalidTopic(String),
}

impl Error {
    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Validation { status, .. }
            | Self::Server { status, .. }
            | Self::Api { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Server { .. } | Self::RealtimeConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Field-scoped validation messages, if the server sent any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}
