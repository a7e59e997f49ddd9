/// Errors that can occur while building a signed request.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// No credentials could be resolved from the configured provider.
    #[error("no signing credentials available: {0}")]
    MissingCredentials(String),

    /// The target URL cannot be signed.
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A header name or value is not valid HTTP.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The signing library rejected the request or its parameters.
    #[error("failed to sign request: {0}")]
    Signing(String),

    /// A shared credentials or config file exists but cannot be used.
    #[error("failed to read credentials file {path}: {reason}")]
    ProfileFile { path: String, reason: String },

    /// The request body could not be encoded.
    #[error("failed to serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SignError>;
