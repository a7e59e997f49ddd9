//! Transports for signed producer requests.
//!
//! Two ways to reach the remote side, both blocking and single-shot:
//! - [`HttpTransport`]: POST a [`SignedRequest`](msgdispatch_sign::SignedRequest)
//!   to a URL
//! - [`FunctionInvokeTransport`]: synchronous function invocation through the
//!   signed Invoke API
//!
//! Neither retries. A response with any status is returned as-is; only
//! failures that never produced a status become [`TransportError`]s.
//! The [`HttpSend`] and [`FunctionInvoke`] traits are the seams producers
//! are generic over.

pub mod error;
pub mod http;
pub mod lambda;
pub mod traits;

#[cfg(test)]
mod test_server;

pub use error::{Result, TransportError};
pub use http::{HttpConfig, HttpTransport};
pub use lambda::{FunctionInvokeTransport, FUNCTION_ERROR_HEADER, LAMBDA_SERVICE};
pub use traits::{FunctionInvoke, HttpSend, InvokeResponse, RawResponse};
