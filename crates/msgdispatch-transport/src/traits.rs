use std::borrow::Cow;

use bytes::Bytes;
use msgdispatch_sign::SignedRequest;

use crate::error::Result;

/// Status and body returned by an HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Result envelope of a synchronous function invocation.
///
/// `status` belongs to the invocation channel itself. A function that ran
/// and raised is reported through `function_error` with the error document
/// in `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub status: u16,
    pub function_error: Option<String>,
    pub payload: Bytes,
}

impl InvokeResponse {
    pub fn new(status: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            status,
            function_error: None,
            payload: payload.into(),
        }
    }

    pub fn with_function_error(mut self, kind: impl Into<String>) -> Self {
        self.function_error = Some(kind.into());
        self
    }

    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Sends one signed request and waits for the response.
pub trait HttpSend {
    fn post(&self, request: SignedRequest) -> Result<RawResponse>;
}

/// Invokes a named remote function with request/response semantics.
pub trait FunctionInvoke {
    fn invoke(&self, function: &str, payload: Bytes, region: &str) -> Result<InvokeResponse>;
}

impl<T: HttpSend + ?Sized> HttpSend for &T {
    fn post(&self, request: SignedRequest) -> Result<RawResponse> {
        (**self).post(request)
    }
}

impl<T: FunctionInvoke + ?Sized> FunctionInvoke for &T {
    fn invoke(&self, function: &str, payload: Bytes, region: &str) -> Result<InvokeResponse> {
        (**self).invoke(function, payload, region)
    }
}
