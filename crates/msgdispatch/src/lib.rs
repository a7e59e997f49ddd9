//! Schema-checked, signed message delivery.
//!
//! msgdispatch validates an event message against a JSON Schema, signs it
//! with AWS Signature Version 4, and delivers it either by HTTPS POST or by
//! synchronous function invocation, returning the backend's tracking id.
//!
//! # Crate Structure
//!
//! - [`schema`]: Message types, schema sources, validation with defaults
//! - [`sign`]: SigV4 request signing and credential providers
//! - [`transport`]: HTTP and function-invocation transports (behind `producer` feature)
//! - [`producer`]: Orchestration, response normalization, configuration (behind `producer` feature)

/// Re-export schema types.
pub mod schema {
    pub use msgdispatch_schema::*;
}

/// Re-export signing types.
pub mod sign {
    pub use msgdispatch_sign::*;
}

/// Re-export transport types (requires `producer` feature).
#[cfg(feature = "producer")]
pub mod transport {
    pub use msgdispatch_transport::*;
}

/// Re-export producer types (requires `producer` feature).
#[cfg(feature = "producer")]
pub mod producer {
    pub use msgdispatch_producer::*;
}

#[cfg(feature = "producer")]
pub use msgdispatch_producer::{Producer, ProducerConfig, ProducerError, Receipt};
