// ── Core error types ──
//
// User-facing errors from ledgerdesk-core. Consumers never branch on HTTP
// status codes: the `From<ledgerdesk_api::Error>` impl folds transport and
// status-class errors into this taxonomy, and `message()` reduces any of
// them to the single display string shown in toasts and forms.

use ledgerdesk_api::FieldErrors;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Field key used by `validator` for struct-level (schema) errors.
const SCHEMA_FIELD: &str = "__all__";

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// No response: connection, DNS, TLS, timeout.
    Transport,
    /// Rejected locally before any request was sent.
    ClientValidation,
    /// 400/422 from the server.
    ServerValidation,
    /// 401/403.
    Authorization,
    NotFound,
    Conflict,
    /// 5xx.
    Server,
    Other,
}

/// Unified error type for the core crate.
///
/// `Clone` so one failed shared fetch can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Transport ────────────────────────────────────────────────────
    #[error("Network error: {message}")]
    Transport { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ClientValidation { message: String, fields: FieldErrors },

    #[error("Rejected by server: {message}")]
    ServerValidation { message: String, fields: FieldErrors },

    // ── Authorization ────────────────────────────────────────────────
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // ── Resource state ───────────────────────────────────────────────
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    // ── Server ───────────────────────────────────────────────────────
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Session ──────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::ClientValidation { .. } => ErrorKind::ClientValidation,
            Self::ServerValidation { .. } => ErrorKind::ServerValidation,
            Self::Unauthorized { .. } | Self::Forbidden { .. } => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Server { .. } => ErrorKind::Server,
            Self::Api { .. } | Self::Config { .. } | Self::Internal(_) => ErrorKind::Other,
        }
    }

    /// The single human-readable message for toasts and inline form errors.
    ///
    /// Validation errors without a useful top-level message fall back to the
    /// first field error, rendered as `field: message`.
    pub fn message(&self) -> String {
        match self {
            Self::ClientValidation { message, fields }
            | Self::ServerValidation { message, fields } => {
                if message.trim().is_empty() {
                    first_field_error(fields).unwrap_or_else(|| "Invalid input".into())
                } else {
                    message.clone()
                }
            }
            Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Server { message, .. }
            | Self::Api { message, .. } => message.clone(),
            Self::Transport { .. } | Self::Config { .. } | Self::Internal(_) => self.to_string(),
        }
    }

    /// Field-scoped messages for validation errors.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::ClientValidation { fields, .. } | Self::ServerValidation { fields, .. } => {
                Some(fields)
            }
            _ => None,
        }
    }
}

fn first_field_error(fields: &FieldErrors) -> Option<String> {
    fields.iter().find_map(|(field, messages)| {
        let message = messages.first()?;
        if field == SCHEMA_FIELD {
            Some(message.clone())
        } else {
            Some(format!("{field}: {message}"))
        }
    })
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ledgerdesk_api::Error> for CoreError {
    fn from(err: ledgerdesk_api::Error) -> Self {
        use ledgerdesk_api::Error as Api;

        match err {
            Api::Transport(e) => match e.status() {
                Some(status) => CoreError::Api {
                    message: e.to_string(),
                    code: None,
                    status: Some(status.as_u16()),
                },
                None => CoreError::Transport {
                    message: e.to_string(),
                },
            },
            Api::Timeout { timeout_secs } => CoreError::Transport {
                message: format!("request timed out after {timeout_secs}s"),
            },
            Api::Tls(message) => CoreError::Transport {
                message: format!("TLS error: {message}"),
            },
            Api::RealtimeConnect(reason) => CoreError::Transport { message: reason },
            Api::RealtimeClosed { code, reason } => CoreError::Transport {
                message: format!("real-time channel closed (code {code}): {reason}"),
            },
            Api::Validation {
                message, fields, ..
            } => CoreError::ServerValidation { message, fields },
            Api::Unauthorized { message } => CoreError::Unauthorized { message },
            Api::Forbidden { message } => CoreError::Forbidden { message },
            Api::NotFound { message } => CoreError::NotFound { message },
            Api::Conflict { message } => CoreError::Conflict { message },
            Api::Server { status, message } => CoreError::Server { status, message },
            Api::Api {
                status,
                message,
                code,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::InvalidId(id) => CoreError::ClientValidation {
                message: format!("Invalid record id '{id}'"),
                fields: FieldErrors::new(),
            },
            Api::InvalidTopic(topic) => CoreError::Config {
                message: format!("Invalid topic '{topic}'"),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::Encoding(message) => CoreError::Internal(format!("Encoding error: {message}")),
        }
    }
}

// ── Conversion from schema validation ────────────────────────────────

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        flatten_validation(&errors, "", &mut fields);
        let message = first_field_error(&fields).unwrap_or_else(|| "Invalid input".into());
        CoreError::ClientValidation { message, fields }
    }
}

/// Flatten nested struct/list errors into `a.b[0].c` keyed messages.
fn flatten_validation(errors: &ValidationErrors, prefix: &str, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else if *field == SCHEMA_FIELD {
            prefix.to_owned()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                messages.extend(list.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string)
                }));
            }
            ValidationErrorsKind::Struct(inner) => flatten_validation(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}
