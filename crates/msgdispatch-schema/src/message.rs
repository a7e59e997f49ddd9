use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message key holding the handling class.
pub const SECURITY_LEVEL_KEY: &str = "security_level";

/// Delivery behavior requested for a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    #[default]
    Instant,
}

impl Behavior {
    pub fn as_str(self) -> &'static str {
        match self {
            Behavior::Instant => "instant",
        }
    }
}

impl FromStr for Behavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instant" => Ok(Behavior::Instant),
            other => Err(format!("unknown behavior '{other}' (expected 'instant')")),
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handling class for a message payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Sensitive,
    #[default]
    Normal,
}

impl SecurityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Sensitive => "sensitive",
            SecurityLevel::Normal => "normal",
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensitive" => Ok(SecurityLevel::Sensitive),
            "normal" => Ok(SecurityLevel::Normal),
            other => Err(format!(
                "unknown security level '{other}' (expected 'sensitive' or 'normal')"
            )),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed form of a producer message.
///
/// Convenience for callers that build messages in code. The validator works
/// on plain JSON, so anything that serializes to the same shape is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub event_type: String,
    pub message_channel: String,
    pub behavior: Behavior,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,
}

impl Message {
    /// New instant message with no explicit security level.
    pub fn new(
        event_type: impl Into<String>,
        message_channel: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            message_channel: message_channel.into(),
            behavior: Behavior::Instant,
            payload,
            security_level: None,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// A message that passed schema validation, with defaults applied.
///
/// This is always a fresh copy; the caller's input is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMessage {
    fields: Map<String, Value>,
    security_level: SecurityLevel,
}

impl ValidatedMessage {
    pub(crate) fn new(fields: Map<String, Value>, security_level: SecurityLevel) -> Self {
        Self {
            fields,
            security_level,
        }
    }

    /// Resolved handling class (explicit or defaulted).
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// String field accessor.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.get_str("event_type")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Canonical wire encoding: compact JSON, produced once per send.
    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(&self.fields).map(Bytes::from)
    }
}

impl Serialize for ValidatedMessage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
