use std::fmt;

use msgdispatch_schema::SchemaError;
use msgdispatch_sign::SignError;
use msgdispatch_transport::TransportError;
use serde::Serialize;

/// Longest raw body cited in an error, in characters.
pub const MAX_CITED_BODY: usize = 512;

/// Failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Config,
    Auth,
    Transport,
    Application,
    Protocol,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Config => "config",
            FailureKind::Auth => "auth",
            FailureKind::Transport => "transport",
            FailureKind::Application => "application",
            FailureKind::Protocol => "protocol",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure a send can end in. Each path yields exactly one of these.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The message does not satisfy the schema. Raised before any I/O.
    #[error("invalid message structure: {0}")]
    Validation(String),

    /// Schema, endpoint, or other configuration cannot be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// No signing credentials are available.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The network or invocation channel failed.
    #[error("transport failure: {detail}")]
    Transport {
        detail: String,
        /// Invocation channel status, when one was returned.
        status: Option<u16>,
        #[source]
        source: Option<TransportError>,
    },

    /// The remote side ran and reported failure.
    #[error("remote failure (status {status}): {body}")]
    Application { status: u16, body: String },

    /// The response could not be understood.
    #[error("unrecognized response: {0}")]
    Protocol(String),
}

impl ProducerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProducerError::Validation(_) => FailureKind::Validation,
            ProducerError::Config(_) => FailureKind::Config,
            ProducerError::Auth(_) => FailureKind::Auth,
            ProducerError::Transport { .. } => FailureKind::Transport,
            ProducerError::Application { .. } => FailureKind::Application,
            ProducerError::Protocol(_) => FailureKind::Protocol,
        }
    }

    /// Whether resending could plausibly succeed. Nothing here retries;
    /// this is advice for the caller.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transport
    }

    /// Status code attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProducerError::Transport { status, .. } => *status,
            ProducerError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn channel_status(status: u16, body: &str) -> Self {
        ProducerError::Transport {
            detail: format!(
                "invocation channel returned status {status}: {}",
                truncate_body(body)
            ),
            status: Some(status),
            source: None,
        }
    }

    pub(crate) fn application(status: u16, body: &str) -> Self {
        ProducerError::Application {
            status,
            body: truncate_body(body),
        }
    }
}

impl From<SchemaError> for ProducerError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::ValidationFailed { message } => ProducerError::Validation(message),
            other => ProducerError::Config(other.to_string()),
        }
    }
}

impl From<SignError> for ProducerError {
    fn from(err: SignError) -> Self {
        match err {
            SignError::MissingCredentials(reason) => ProducerError::Auth(reason),
            SignError::Serialize(err) => {
                ProducerError::Validation(format!("message cannot be encoded: {err}"))
            }
            other => ProducerError::Config(other.to_string()),
        }
    }
}

impl From<TransportError> for ProducerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Signing(err) => err.into(),
            TransportError::InvalidTarget(reason) => ProducerError::Config(reason),
            TransportError::Client(err) => {
                ProducerError::Config(format!("HTTP client unavailable: {err}"))
            }
            network @ TransportError::Network { .. } => ProducerError::Transport {
                detail: network.to_string(),
                status: None,
                source: Some(network),
            },
        }
    }
}

/// Cut `text` to [`MAX_CITED_BODY`] characters for inclusion in errors.
pub fn truncate_body(text: &str) -> String {
    match text.char_indices().nth(MAX_CITED_BODY) {
        Some((cut, _)) => format!("{}... [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ProducerError>;
