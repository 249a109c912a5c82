//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ledgerdesk_config::ConfigError;
use ledgerdesk_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the ledger API: {reason}")]
    #[diagnostic(
        code(ledgerdesk::connection_failed),
        help(
            "Check the API URL and your network.\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in the profile."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Real-time channel failed: {reason}")]
    #[diagnostic(
        code(ledgerdesk::realtime),
        help("Set realtime_url on the profile (ws:// or wss://) or pass --realtime-url.")
    )]
    Realtime { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ledgerdesk::auth_failed),
        help("Store a fresh token with: ledgerdesk config set-token")
    )]
    AuthFailed { message: String },

    #[error("Not allowed: {message}")]
    #[diagnostic(code(ledgerdesk::forbidden))]
    Forbidden { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(ledgerdesk::not_found))]
    NotFound { message: String },

    #[error("{message}")]
    #[diagnostic(code(ledgerdesk::conflict))]
    Conflict { message: String },

    #[error("Server error ({status}): {message}")]
    #[diagnostic(code(ledgerdesk::server))]
    Server { status: u16, message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(ledgerdesk::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ledgerdesk::validation))]
    Validation { field: String, reason: String },

    #[error("Rejected: {message}")]
    #[diagnostic(code(ledgerdesk::rejected))]
    Rejected { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ledgerdesk::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ledgerdesk config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No API URL configured")]
    #[diagnostic(
        code(ledgerdesk::no_config),
        help(
            "Create a profile with: ledgerdesk config init\n\
             Or pass --api-url / set LEDGERDESK_API_URL.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(ledgerdesk::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(ledgerdesk::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(ledgerdesk::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Realtime { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Forbidden { .. } => exit_code::PERMISSION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::Rejected { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ───────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.message();
        match err {
            CoreError::Transport { .. } => Self::ConnectionFailed { reason: message },
            CoreError::ClientValidation { .. } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::ServerValidation { .. } => Self::Rejected { message },
            CoreError::Unauthorized { .. } => Self::AuthFailed { message },
            CoreError::Forbidden { .. } => Self::Forbidden { message },
            CoreError::NotFound { .. } => Self::NotFound { message },
            CoreError::Conflict { .. } => Self::Conflict { message },
            CoreError::Server { status, .. } => Self::Server { status, message },
            CoreError::Api { .. } => Self::Api { message },
            CoreError::Config { .. } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(_) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: available_profiles(),
            },
            other => Self::Config(other),
        }
    }
}

fn available_profiles() -> String {
    let cfg = ledgerdesk_config::load_config_or_default();
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
