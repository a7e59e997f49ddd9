//! JSON Schema validation for producer messages.
//!
//! Validate event messages against the producer payload schema before they
//! go anywhere near the network. Defaults are applied to a copy of the
//! message; the caller's value is never mutated.

pub mod config;
pub mod error;
pub mod message;
pub mod source;
pub mod validator;

pub use config::ValidatorConfig;
pub use error::{Result, SchemaError};
pub use message::{Behavior, Message, SecurityLevel, ValidatedMessage, SECURITY_LEVEL_KEY};
pub use source::{
    FileSchemaSource, SchemaSource, StaticSchemaSource, BUNDLED_SCHEMA, SCHEMA_FILE_NAME,
};
pub use validator::SchemaValidator;
