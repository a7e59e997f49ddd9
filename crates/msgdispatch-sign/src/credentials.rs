use std::fmt;

use crate::error::{Result, SignError};
use crate::profile::ProfileCredentials;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

/// Access key pair plus optional session token.
///
/// Secret material is redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Credentials");
        dbg.field("access_key_id", &self.access_key_id).field(
            "secret_access_key",
            &format_args!("<redacted:{} bytes>", self.secret_access_key.len()),
        );
        if let Some(token) = &self.session_token {
            dbg.field(
                "session_token",
                &format_args!("<redacted:{} bytes>", token.len()),
            );
        } else {
            dbg.field("session_token", &Option::<String>::None);
        }
        dbg.finish()
    }
}

/// Supplies credentials to the signer.
///
/// Resolved once per signed request, so implementations may refresh
/// short-lived credentials between calls.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl CredentialsProvider for Credentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
/// `AWS_SESSION_TOKEN` from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Resolve credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let access_key_id = read(ACCESS_KEY_ID_VAR)
            .ok_or_else(|| SignError::MissingCredentials(format!("{ACCESS_KEY_ID_VAR} not set")))?;
        let secret_access_key = read(SECRET_ACCESS_KEY_VAR).ok_or_else(|| {
            SignError::MissingCredentials(format!("{SECRET_ACCESS_KEY_VAR} not set"))
        })?;

        let credentials = Credentials::new(access_key_id, secret_access_key);
        Ok(match read(SESSION_TOKEN_VAR) {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }
}

impl CredentialsProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn name(&self) -> &'static str {
        "environment"
    }
}

/// Environment variables first, then the shared profile files.
#[derive(Debug, Clone, Default)]
pub struct DefaultCredentialsChain {
    profile: ProfileCredentials,
}

impl DefaultCredentialsChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile_provider(profile: ProfileCredentials) -> Self {
        Self { profile }
    }

    fn resolve(
        env: Result<Credentials>,
        profile: impl FnOnce() -> Result<Credentials>,
    ) -> Result<Credentials> {
        let env_reason = match env {
            Ok(credentials) => return Ok(credentials),
            Err(SignError::MissingCredentials(reason)) => reason,
            Err(err) => return Err(err),
        };
        match profile() {
            Err(SignError::MissingCredentials(profile_reason)) => Err(
                SignError::MissingCredentials(format!("{env_reason}; {profile_reason}")),
            ),
            other => other,
        }
    }
}

impl CredentialsProvider for DefaultCredentialsChain {
    fn credentials(&self) -> Result<Credentials> {
        Self::resolve(EnvCredentials.credentials(), || self.profile.credentials())
    }

    fn name(&self) -> &'static str {
        "default-chain"
    }
}
