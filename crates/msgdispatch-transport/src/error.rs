use msgdispatch_sign::SignError;

/// Errors that can occur before a remote status code is obtained.
///
/// Anything that produced an HTTP status, success or not, is returned as a
/// response instead.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connect, DNS, TLS, timeout, or reset while talking to the endpoint.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    /// The function identifier or region cannot address an endpoint.
    #[error("invalid invocation target: {0}")]
    InvalidTarget(String),

    /// The invocation request could not be signed.
    #[error("failed to sign invocation request: {0}")]
    Signing(#[from] SignError),
}

impl TransportError {
    /// True when the request gave up waiting on the remote side.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Network { source, .. } if source.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
