use std::path::PathBuf;
use std::time::Duration;

use msgdispatch_schema::{Behavior, Message, SecurityLevel};
use serde_json::Value;

use crate::error::{ProducerError, Result};
use crate::normalize::TrackingIdPolicy;

pub const PRODUCER_URL_VAR: &str = "MSGDISPATCH_PRODUCER_URL";
pub const PRODUCER_FUNCTION_VAR: &str = "MSGDISPATCH_PRODUCER_FUNCTION";
pub const INVOKE_ENDPOINT_VAR: &str = "MSGDISPATCH_INVOKE_ENDPOINT";
pub const BEHAVIOR_VAR: &str = "MSGDISPATCH_BEHAVIOR";
pub const REGION_VAR: &str = "AWS_REGION";
pub const SERVICE_VAR: &str = "AWS_SERVICE";
pub const SCHEMA_PATH_VAR: &str = "MSGDISPATCH_SCHEMA_PATH";
pub const TIMEOUT_VAR: &str = "MSGDISPATCH_TIMEOUT_SECS";
pub const ALLOW_MISSING_TRACKING_ID_VAR: &str = "MSGDISPATCH_ALLOW_MISSING_TRACKING_ID";
pub const STRICT_SCHEMA_VAR: &str = "MSGDISPATCH_STRICT_SCHEMA";
pub const BUNDLED_SCHEMA_VAR: &str = "MSGDISPATCH_BUNDLED_SCHEMA";

pub const DEFAULT_REGION: &str = "ap-southeast-2";
pub const DEFAULT_SERVICE: &str = "lambda";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Producer settings, usually loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Endpoint for [`send_to_default_url`](crate::Producer::send_to_default_url).
    pub producer_url: Option<String>,
    /// Function for [`send_to_default_function`](crate::Producer::send_to_default_function).
    pub function: Option<String>,
    /// Replaces the regional invocation host, e.g. a local emulator.
    pub invoke_endpoint: Option<String>,
    /// Behavior stamped on messages built by [`ProducerConfig::message`].
    pub behavior: Behavior,
    pub region: String,
    /// Signing service name for URL delivery.
    pub service: String,
    /// Explicit schema file. `None` searches the default locations.
    pub schema_path: Option<PathBuf>,
    /// Use the schema compiled into the binary instead of searching the
    /// default locations. Ignored when `schema_path` is set.
    pub bundled_schema: bool,
    pub timeout: Duration,
    pub tracking_id_policy: TrackingIdPolicy,
    /// Reject message keys the schema does not declare.
    pub strict_schema: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            producer_url: None,
            function: None,
            invoke_endpoint: None,
            behavior: Behavior::Instant,
            region: DEFAULT_REGION.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            schema_path: None,
            bundled_schema: false,
            timeout: DEFAULT_TIMEOUT,
            tracking_id_policy: TrackingIdPolicy::Required,
            strict_schema: false,
        }
    }
}

impl ProducerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let behavior = match get(BEHAVIOR_VAR) {
            Some(value) => value
                .parse::<Behavior>()
                .map_err(|err| invalid(BEHAVIOR_VAR, &err))?,
            None => defaults.behavior,
        };
        let timeout = match get(TIMEOUT_VAR) {
            Some(value) => parse_timeout(&value).map_err(|err| invalid(TIMEOUT_VAR, &err))?,
            None => defaults.timeout,
        };
        let flag = |var: &str, default: bool| match get(var) {
            Some(value) => parse_flag(&value).map_err(|err| invalid(var, &err)),
            None => Ok(default),
        };
        let tracking_id_policy = if flag(ALLOW_MISSING_TRACKING_ID_VAR, false)? {
            TrackingIdPolicy::Permissive
        } else {
            defaults.tracking_id_policy
        };
        let strict_schema = flag(STRICT_SCHEMA_VAR, defaults.strict_schema)?;
        let bundled_schema = flag(BUNDLED_SCHEMA_VAR, defaults.bundled_schema)?;

        Ok(Self {
            producer_url: get(PRODUCER_URL_VAR),
            function: get(PRODUCER_FUNCTION_VAR),
            invoke_endpoint: get(INVOKE_ENDPOINT_VAR),
            behavior,
            region: get(REGION_VAR).unwrap_or(defaults.region),
            service: get(SERVICE_VAR).unwrap_or(defaults.service),
            schema_path: get(SCHEMA_PATH_VAR).map(PathBuf::from),
            bundled_schema,
            timeout,
            tracking_id_policy,
            strict_schema,
        })
    }

    /// Build a message with the configured behavior.
    pub fn message(
        &self,
        event_type: impl Into<String>,
        message_channel: impl Into<String>,
        payload: Value,
        security_level: Option<SecurityLevel>,
    ) -> Message {
        let message =
            Message::new(event_type, message_channel, payload).with_behavior(self.behavior);
        match security_level {
            Some(level) => message.with_security_level(level),
            None => message,
        }
    }
}

fn invalid(var: &str, reason: &str) -> ProducerError {
    ProducerError::Config(format!("{var}: {reason}"))
}

/// Whole or fractional seconds, greater than zero.
pub fn parse_timeout(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("timeout must be positive, got '{value}'"));
    }
    Ok(Duration::from_secs_f64(seconds))
}

pub fn parse_flag(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}
