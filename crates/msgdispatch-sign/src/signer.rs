use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, Uri};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::credentials::{Credentials, CredentialsProvider, DefaultCredentialsChain};
use crate::error::{Result, SignError};

/// Signing algorithm identifier carried in the `Authorization` header.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

// Headers the signer owns; callers cannot supply their own values.
const RESERVED_HEADERS: [&str; 6] = [
    "authorization",
    "content-type",
    "host",
    X_AMZ_CONTENT_SHA256,
    X_AMZ_DATE,
    X_AMZ_SECURITY_TOKEN,
];

/// A POST request whose body bytes are exactly the bytes that were signed.
pub struct SignedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    payload_hash: String,
}

impl SignedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Body to transmit. Shares storage with the signed bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Hex SHA-256 of the body, as covered by the signature.
    pub fn payload_hash(&self) -> &str {
        &self.payload_hash
    }

    pub fn into_parts(self) -> (Method, Uri, HeaderMap, Bytes) {
        (self.method, self.uri, self.headers, self.body)
    }
}

impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(HeaderName::as_str).collect();
        f.debug_struct("SignedRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &header_names)
            .field("body", &format_args!("<{} bytes>", self.body.len()))
            .field("payload_hash", &self.payload_hash)
            .finish()
    }
}

/// Produces SigV4-signed POST requests.
///
/// Credentials come from the injected provider on every call, and every
/// call stamps a fresh timestamp. A signed request is only accepted by the
/// service within its clock-skew window, so sign right before sending.
#[derive(Clone)]
pub struct RequestSigner {
    provider: Arc<dyn CredentialsProvider>,
}

impl RequestSigner {
    pub fn new(provider: impl CredentialsProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn from_shared(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self { provider }
    }

    /// Signer backed by the environment variables, then the shared profile files.
    pub fn from_env() -> Self {
        Self::new(DefaultCredentialsChain::new())
    }

    /// Name of the credentials provider, for diagnostics.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// True if the provider currently yields credentials.
    pub fn has_credentials(&self) -> bool {
        self.check_credentials().is_ok()
    }

    /// Resolve credentials once, keeping only the failure.
    pub fn check_credentials(&self) -> Result<()> {
        self.provider.credentials().map(|_| ())
    }

    /// Serialize `body` to JSON once and sign those bytes.
    pub fn sign<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        region: &str,
        service: &str,
    ) -> Result<SignedRequest> {
        let bytes = Bytes::from(serde_json::to_vec(body)?);
        self.sign_bytes(url, bytes, region, service, &[])
    }

    /// Sign pre-encoded JSON bytes, optionally covering extra headers.
    pub fn sign_bytes(
        &self,
        url: &str,
        body: Bytes,
        region: &str,
        service: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<SignedRequest> {
        self.sign_bytes_at(url, body, region, service, extra_headers, Utc::now())
    }

    /// As [`sign_bytes`](Self::sign_bytes) with an explicit signing time.
    pub fn sign_bytes_at(
        &self,
        url: &str,
        body: Bytes,
        region: &str,
        service: &str,
        extra_headers: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        let (uri, host) = parse_url(url)?;
        for (name, _) in extra_headers {
            let lower = name.to_ascii_lowercase();
            if RESERVED_HEADERS.contains(&lower.as_str()) {
                return Err(SignError::InvalidHeader {
                    name: name.to_string(),
                    reason: "header is set by the signer".to_string(),
                });
            }
        }

        let credentials = self.provider.credentials()?;
        let identity = identity(&credentials);
        let payload_hash = sha256_hex(&body);

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(region)
            .name(service)
            .time(SystemTime::from(now))
            .settings(settings)
            .build()
            .map_err(|err| SignError::Signing(err.to_string()))?
            .into();

        let mut request_headers: Vec<(&str, &str)> = vec![("content-type", CONTENT_TYPE_JSON)];
        request_headers.extend_from_slice(extra_headers);
        let signable = SignableRequest::new(
            "POST",
            url,
            request_headers.iter().copied(),
            SignableBody::Precomputed(payload_hash.clone()),
        )
        .map_err(|err| SignError::Signing(err.to_string()))?;
        let (instructions, _signature) = sign(signable, &params)
            .map_err(|err| SignError::Signing(err.to_string()))?
            .into_parts();

        let mut header_map = HeaderMap::with_capacity(request_headers.len() + 4);
        for (name, value) in request_headers.iter().copied().chain(instructions.headers()) {
            insert_header(&mut header_map, name, value)?;
        }

        debug!(
            %host,
            region,
            service,
            body_len = body.len(),
            provider = self.provider.name(),
            "request signed"
        );

        Ok(SignedRequest {
            method: Method::POST,
            uri,
            headers: header_map,
            body,
            payload_hash,
        })
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("provider", &self.provider.name())
            .finish()
    }
}

fn parse_url(url: &str) -> Result<(Uri, String)> {
    let invalid = |reason: &str| SignError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|err: http::uri::InvalidUri| invalid(&err.to_string()))?;
    let scheme = uri.scheme_str().ok_or_else(|| invalid("missing scheme"))?;
    let default_port = match scheme {
        "https" => 443,
        "http" => 80,
        _ => return Err(invalid("scheme must be http or https")),
    };
    let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
    if authority.host().is_empty() {
        return Err(invalid("missing host"));
    }

    let host = match authority.port_u16() {
        Some(port) if port != default_port => format!("{}:{port}", authority.host()),
        _ => authority.host().to_string(),
    };
    Ok((uri, host))
}

fn identity(credentials: &Credentials) -> Identity {
    aws_credential_types::Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        credentials.session_token().map(str::to_string),
        None,
        "msgdispatch",
    )
    .into()
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| SignError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|err| SignError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    map.insert(header_name, header_value);
    Ok(())
}
