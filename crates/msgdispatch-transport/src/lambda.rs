use bytes::Bytes;
use msgdispatch_sign::RequestSigner;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::http::{HttpConfig, HttpTransport};
use crate::traits::{FunctionInvoke, InvokeResponse};

/// Signing service name for the invocation endpoint.
pub const LAMBDA_SERVICE: &str = "lambda";
/// Invoke API version segment.
pub const INVOKE_API_VERSION: &str = "2015-03-31";
/// Response header naming a function-level error.
pub const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";
const INVOCATION_TYPE_HEADER: &str = "x-amz-invocation-type";
const REQUEST_RESPONSE: &str = "RequestResponse";

/// Synchronous function invocation over the signed Invoke API.
///
/// The function is addressed by name, ARN, or partial ARN with an optional
/// `:qualifier`. Exactly one invoke is issued per call.
#[derive(Debug, Clone)]
pub struct FunctionInvokeTransport {
    signer: RequestSigner,
    http: HttpTransport,
    endpoint: Option<String>,
}

impl FunctionInvokeTransport {
    pub fn new(signer: RequestSigner) -> Result<Self> {
        Ok(Self::with_http(signer, HttpTransport::new()?))
    }

    pub fn with_config(signer: RequestSigner, config: HttpConfig) -> Result<Self> {
        Ok(Self::with_http(signer, HttpTransport::with_config(config)?))
    }

    pub fn with_http(signer: RequestSigner, http: HttpTransport) -> Self {
        Self {
            signer,
            http,
            endpoint: None,
        }
    }

    /// Send invocations to `endpoint` (scheme and authority) instead of the
    /// regional service host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// URL the invocation of `function` in `region` is posted to.
    pub fn invoke_url(&self, function: &str, region: &str) -> Result<String> {
        let function = function.trim();
        if function.is_empty() {
            return Err(TransportError::InvalidTarget(
                "function name must not be empty".to_string(),
            ));
        }
        let region = region.trim();
        if region.is_empty() || region.contains(['/', ' ']) {
            return Err(TransportError::InvalidTarget(format!(
                "region {region:?} is not usable"
            )));
        }

        let base = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{LAMBDA_SERVICE}.{region}.amazonaws.com"),
        };
        Ok(format!(
            "{base}/{INVOKE_API_VERSION}/functions/{}/invocations",
            urlencoding::encode(function)
        ))
    }
}

impl FunctionInvoke for FunctionInvokeTransport {
    fn invoke(&self, function: &str, payload: Bytes, region: &str) -> Result<InvokeResponse> {
        let url = self.invoke_url(function, region)?;
        let request = self.signer.sign_bytes(
            &url,
            payload,
            region.trim(),
            LAMBDA_SERVICE,
            &[(INVOCATION_TYPE_HEADER, REQUEST_RESPONSE)],
        )?;

        let (status, headers, payload) = self.http.execute(request)?;
        let function_error = headers
            .get(FUNCTION_ERROR_HEADER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        match &function_error {
            Some(kind) => warn!(function, status, kind = %kind, "function reported an error"),
            None => debug!(function, status, bytes = payload.len(), "function invoked"),
        }

        Ok(InvokeResponse {
            status,
            function_error,
            payload,
        })
    }
}
