/// Errors that can occur while loading a schema or validating a message.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema document could not be resolved or read.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The message failed schema validation.
    #[error("invalid message structure: {message}")]
    ValidationFailed { message: String },

    /// The schema document is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl SchemaError {
    /// True when the error is about the message rather than the schema itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, SchemaError::ValidationFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
