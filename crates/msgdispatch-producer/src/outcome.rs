use std::time::Duration;

use msgdispatch_schema::SecurityLevel;
use serde::Serialize;

use crate::error::{FailureKind, ProducerError, Result};

/// Normalized result of one delivery attempt.
#[derive(Debug)]
pub enum Outcome {
    Success { tracking_id: Option<String> },
    Failure(ProducerError),
}

impl Outcome {
    pub fn success(tracking_id: impl Into<String>) -> Self {
        Outcome::Success {
            tracking_id: Some(tracking_id.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn tracking_id(&self) -> Option<&str> {
        match self {
            Outcome::Success { tracking_id } => tracking_id.as_deref(),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(err) => Some(err.kind()),
        }
    }

    pub fn into_result(self) -> Result<Option<String>> {
        match self {
            Outcome::Success { tracking_id } => Ok(tracking_id),
            Outcome::Failure(err) => Err(err),
        }
    }
}

impl From<Result<Option<String>>> for Outcome {
    fn from(result: Result<Option<String>>) -> Self {
        match result {
            Ok(tracking_id) => Outcome::Success { tracking_id },
            Err(err) => Outcome::Failure(err),
        }
    }
}

/// Where a message was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Route {
    Url(String),
    Function(String),
}

impl Route {
    pub fn target(&self) -> &str {
        match self {
            Route::Url(target) | Route::Function(target) => target,
        }
    }
}

/// Successful delivery as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub tracking_id: Option<String>,
    pub route: Route,
    pub region: String,
    pub security_level: SecurityLevel,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
