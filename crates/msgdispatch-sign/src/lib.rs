//! AWS Signature Version 4 request signing.
//!
//! Turns a URL and a JSON body into a POST request carrying a SigV4
//! `Authorization` header computed by `aws-sigv4`. The body is encoded once;
//! the bytes that are hashed into the signature are the bytes that go on the
//! wire.
//!
//! Credentials come from an injected [`CredentialsProvider`]: static keys,
//! the process environment, the shared profile files, or the caller's own
//! implementation. [`RequestSigner::from_env`] chains the environment and
//! the profile files.

pub mod credentials;
pub mod error;
pub mod profile;
pub mod signer;

pub use credentials::{Credentials, CredentialsProvider, DefaultCredentialsChain, EnvCredentials};
pub use error::{Result, SignError};
pub use profile::ProfileCredentials;
pub use signer::{sha256_hex, RequestSigner, SignedRequest, ALGORITHM, CONTENT_TYPE_JSON};
