//! Message producer: validate, deliver, normalize.
//!
//! [`Producer`] ties the pieces together. `send_via_url` signs the
//! validated message and POSTs it; `send_via_function` invokes a named
//! function synchronously. Either way the response is reduced by
//! [`ResponseNormalizer`] to a tracking id or one classified
//! [`ProducerError`].
//!
//! ```no_run
//! use msgdispatch_producer::Producer;
//! use serde_json::json;
//!
//! # fn main() -> msgdispatch_producer::Result<()> {
//! let producer = Producer::from_env()?;
//! let receipt = producer.send_to_default_url(&json!({
//!     "event_type": "user.login",
//!     "message_channel": "email",
//!     "behavior": "instant",
//!     "payload": {"user_id": 42}
//! }))?;
//! println!("{:?}", receipt.tracking_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod outcome;
pub mod producer;

pub use config::ProducerConfig;
pub use error::{FailureKind, ProducerError, Result};
pub use normalize::{InvokePayload, ResponseNormalizer, TrackingIdPolicy};
pub use outcome::{Outcome, Receipt, Route};
pub use producer::{load_validator, Producer};
