use std::time::Duration;

use bytes::Bytes;
use msgdispatch_sign::SignedRequest;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{HttpSend, RawResponse};

/// Overall request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("msgdispatch/", env!("CARGO_PKG_VERSION"));

/// Client settings shared by both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        if self.connect_timeout > timeout {
            self.connect_timeout = timeout;
        }
        self
    }
}

/// Blocking HTTPS transport.
///
/// Sends each signed request exactly once. Non-2xx statuses are returned as
/// responses, not errors. Must not be driven from inside an async runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpConfig::default())
    }

    pub fn with_config(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send `request` and collect status, headers, and the full body.
    pub(crate) fn execute(&self, request: SignedRequest) -> Result<(u16, HeaderMap, Bytes)> {
        let (method, uri, headers, body) = request.into_parts();
        let url = uri.to_string();
        let network = |source| TransportError::Network {
            url: url.clone(),
            source,
        };

        debug!(%method, %url, bytes = body.len(), "sending request");
        let response = self
            .client
            .request(method, url.as_str())
            .headers(headers)
            .body(body)
            .send()
            .map_err(network)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(network)?;
        debug!(%url, status, bytes = body.len(), "received response");

        Ok((status, headers, body))
    }
}

impl HttpSend for HttpTransport {
    fn post(&self, request: SignedRequest) -> Result<RawResponse> {
        let (status, _, body) = self.execute(request)?;
        Ok(RawResponse { status, body })
    }
}
