//! Response normalization.
//!
//! A function invocation can answer in two shapes: a gateway envelope
//! `{"statusCode": .., "body": ..}` whose inner status is authoritative, or
//! a flat object carrying the result directly. Both, plus the plain HTTP
//! response, reduce to one [`Outcome`].

use msgdispatch_transport::{InvokeResponse, RawResponse};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{truncate_body, ProducerError, Result};
use crate::outcome::Outcome;

/// The only status treated as success, on every layer.
pub const SUCCESS_STATUS: u16 = 200;
/// Response key carrying the tracking identifier.
pub const TRACKING_ID_KEY: &str = "tracking_id";
const STATUS_CODE_KEY: &str = "statusCode";
const BODY_KEY: &str = "body";

/// What to do with a success response that carries no tracking id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackingIdPolicy {
    /// Treat it as an unrecognized response.
    #[default]
    Required,
    /// Report success without an id, and log a warning.
    Permissive,
}

/// Decoded function payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokePayload {
    /// Output wrapped by a gateway layer.
    Gateway { status_code: Value, body: Value },
    /// Output returned as-is by the function.
    Flat(Map<String, Value>),
}

impl TryFrom<Value> for InvokePayload {
    type Error = ProducerError;

    fn try_from(value: Value) -> Result<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(ProducerError::Protocol(format!(
                    "expected a JSON object payload, got {}",
                    json_type(&other)
                )))
            }
        };

        match fields.remove(STATUS_CODE_KEY) {
            Some(status_code) => Ok(InvokePayload::Gateway {
                status_code,
                body: fields.remove(BODY_KEY).unwrap_or(Value::Null),
            }),
            None => Ok(InvokePayload::Flat(fields)),
        }
    }
}

/// Reduces raw transport results to outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer {
    policy: TrackingIdPolicy,
}

impl ResponseNormalizer {
    pub fn new(policy: TrackingIdPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TrackingIdPolicy {
        self.policy
    }

    /// 200 carries the tracking id in a JSON object; any other status is
    /// an application failure.
    pub fn normalize_http(&self, response: &RawResponse) -> Outcome {
        self.http(response).into()
    }

    pub fn normalize_invoke(&self, response: &InvokeResponse) -> Outcome {
        self.invoke(response).into()
    }

    fn http(&self, response: &RawResponse) -> Result<Option<String>> {
        if response.status != SUCCESS_STATUS {
            return Err(ProducerError::application(
                response.status,
                &response.body_text(),
            ));
        }
        let body = decode_object(&response.body, "response body")?;
        self.tracking_id(&body)
    }

    fn invoke(&self, response: &InvokeResponse) -> Result<Option<String>> {
        if response.status != SUCCESS_STATUS {
            return Err(ProducerError::channel_status(
                response.status,
                &response.payload_text(),
            ));
        }
        if let Some(kind) = &response.function_error {
            return Err(ProducerError::application(
                response.status,
                &format!("function error {kind}: {}", response.payload_text()),
            ));
        }

        let payload: Value = serde_json::from_slice(&response.payload).map_err(|err| {
            ProducerError::Protocol(format!("function payload is not valid JSON: {err}"))
        })?;

        match InvokePayload::try_from(payload)? {
            InvokePayload::Gateway { status_code, body } => {
                let status = gateway_status(&status_code)?;
                if status != SUCCESS_STATUS {
                    return Err(ProducerError::application(status, &raw_text(&body)));
                }
                let body = match body {
                    Value::String(text) => decode_object(text.as_bytes(), "gateway body")?,
                    Value::Object(fields) => fields,
                    other => {
                        return Err(ProducerError::Protocol(format!(
                            "gateway body must be an object or encoded object, got {}",
                            json_type(&other)
                        )))
                    }
                };
                self.tracking_id(&body)
            }
            InvokePayload::Flat(fields) => self.tracking_id(&fields),
        }
    }

    fn tracking_id(&self, fields: &Map<String, Value>) -> Result<Option<String>> {
        match fields.get(TRACKING_ID_KEY) {
            Some(Value::String(id)) => Ok(Some(id.clone())),
            None | Some(Value::Null) => match self.policy {
                TrackingIdPolicy::Required => Err(ProducerError::Protocol(format!(
                    "success response has no {TRACKING_ID_KEY}"
                ))),
                TrackingIdPolicy::Permissive => {
                    warn!("success response has no {TRACKING_ID_KEY}; accepting without one");
                    Ok(None)
                }
            },
            Some(other) => Err(ProducerError::Protocol(format!(
                "{TRACKING_ID_KEY} must be a string, got {}",
                json_type(other)
            ))),
        }
    }
}

fn decode_object(bytes: &[u8], what: &str) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(ProducerError::Protocol(format!(
            "{what} must be a JSON object, got {}",
            json_type(&other)
        ))),
        Err(err) => Err(ProducerError::Protocol(format!(
            "{what} is not valid JSON ({err}): {}",
            truncate_body(&String::from_utf8_lossy(bytes))
        ))),
    }
}

/// Accepts `200` and `"200"`.
fn gateway_status(value: &Value) -> Result<u16> {
    let parsed = match value {
        Value::Number(number) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u16>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ProducerError::Protocol(format!("gateway {STATUS_CODE_KEY} {value} is not a status code"))
    })
}

fn raw_text(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, MAX_CITED_BODY};
    use serde_json::json;

    fn invoke(status: u16, payload: Value) -> InvokeResponse {
        InvokeResponse::new(status, payload.to_string())
    }

    fn strict() -> ResponseNormalizer {
        ResponseNormalizer::default()
    }

    fn kind(outcome: Outcome) -> FailureKind {
        outcome.failure_kind().expect("expected a failure")
    }

    #[test]
    fn test_flat_payload_success() {
        let outcome = strict().normalize_invoke(&invoke(200, json!({"tracking_id": "abc"})));
        assert_eq!(outcome.tracking_id(), Some("abc"));
    }

    #[test]
    fn test_gateway_string_body_success() {
        let outcome = strict().normalize_invoke(&invoke(
            200,
            json!({"statusCode": 200, "body": "{\"tracking_id\":\"xyz\"}"}),
        ));
        assert_eq!(outcome.tracking_id(), Some("xyz"));
    }

    #[test]
    fn test_gateway_object_body_success() {
        let outcome = strict().normalize_invoke(&invoke(
            200,
            json!({"statusCode": "200", "body": {"tracking_id": "obj"}}),
        ));
        assert_eq!(outcome.tracking_id(), Some("obj"));
    }

    #[test]
    fn test_gateway_inner_failure_is_application() {
        let outcome = strict().normalize_invoke(&invoke(
            200,
            json!({"statusCode": 400, "body": "{\"error\":\"bad event\"}"}),
        ));
        match outcome {
            Outcome::Failure(ProducerError::Application { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "{\"error\":\"bad event\"}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_channel_failure_skips_payload_decode() {
        let response = InvokeResponse::new(500, "this is not json");
        let outcome = strict().normalize_invoke(&response);
        match outcome {
            Outcome::Failure(err @ ProducerError::Transport { .. }) => {
                assert_eq!(err.status(), Some(500));
                assert!(err.to_string().contains("500"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_function_error_is_application() {
        let response = InvokeResponse::new(
            200,
            r#"{"errorMessage":"boom","errorType":"RuntimeError"}"#,
        )
        .with_function_error("Unhandled");
        let outcome = strict().normalize_invoke(&response);
        match outcome {
            Outcome::Failure(ProducerError::Application { status, body }) => {
                assert_eq!(status, 200);
                assert!(body.contains("Unhandled"));
                assert!(body.contains("boom"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_non_object_payload_is_protocol() {
        for payload in [json!([1, 2]), json!("tracking"), json!(7), Value::Null] {
            let outcome = strict().normalize_invoke(&invoke(200, payload));
            assert_eq!(kind(outcome), FailureKind::Protocol);
        }
    }

    #[test]
    fn test_malformed_payload_is_protocol() {
        let outcome = strict().normalize_invoke(&InvokeResponse::new(200, "{not json"));
        assert_eq!(kind(outcome), FailureKind::Protocol);

        let outcome = strict().normalize_invoke(&invoke(
            200,
            json!({"statusCode": 200, "body": "{not json"}),
        ));
        assert_eq!(kind(outcome), FailureKind::Protocol);

        let outcome = strict().normalize_invoke(&invoke(
            200,
            json!({"statusCode": 200, "body": "[1]"}),
        ));
        assert_eq!(kind(outcome), FailureKind::Protocol);
    }

    #[test]
    fn test_bad_gateway_status_is_protocol() {
        let outcome = strict().normalize_invoke(&invoke(
            200,
            json!({"statusCode": "ok", "body": "{}"}),
        ));
        assert_eq!(kind(outcome), FailureKind::Protocol);
    }

    #[test]
    fn test_non_string_tracking_id_is_protocol() {
        let outcome = strict().normalize_invoke(&invoke(200, json!({"tracking_id": 12})));
        assert_eq!(kind(outcome), FailureKind::Protocol);
    }

    #[test]
    fn test_missing_tracking_id_policy() {
        let response = invoke(200, json!({"status": "queued"}));

        let outcome = strict().normalize_invoke(&response);
        assert_eq!(kind(outcome), FailureKind::Protocol);

        let permissive = ResponseNormalizer::new(TrackingIdPolicy::Permissive);
        let outcome = permissive.normalize_invoke(&response);
        assert!(outcome.is_success());
        assert_eq!(outcome.tracking_id(), None);

        let outcome = permissive.normalize_http(&RawResponse::new(200, "{}"));
        assert!(outcome.is_success());
    }

    #[test]
    fn test_http_success() {
        let outcome = strict().normalize_http(&RawResponse::new(200, r#"{"tracking_id":"h-1"}"#));
        assert_eq!(outcome.tracking_id(), Some("h-1"));
    }

    #[test]
    fn test_http_error_status_cites_body() {
        let outcome = strict().normalize_http(&RawResponse::new(403, "forbidden"));
        match outcome {
            Outcome::Failure(ProducerError::Application { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_http_cited_body_is_truncated() {
        let long = "e".repeat(MAX_CITED_BODY * 3);
        let outcome = strict().normalize_http(&RawResponse::new(500, long));
        match outcome {
            Outcome::Failure(ProducerError::Application { body, .. }) => {
                assert!(body.len() < MAX_CITED_BODY + 32);
                assert!(body.ends_with("[truncated]"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_http_bad_body_is_protocol() {
        let outcome = strict().normalize_http(&RawResponse::new(200, "<html>"));
        assert_eq!(kind(outcome), FailureKind::Protocol);

        let outcome = strict().normalize_http(&RawResponse::new(200, "[]"));
        assert_eq!(kind(outcome), FailureKind::Protocol);
    }

    #[test]
    fn test_payload_shapes_decode() {
        let gateway = InvokePayload::try_from(json!({"statusCode": 200, "body": "{}"})).unwrap();
        assert_eq!(
            gateway,
            InvokePayload::Gateway {
                status_code: json!(200),
                body: json!("{}")
            }
        );

        let flat = InvokePayload::try_from(json!({"tracking_id": "a"})).unwrap();
        assert!(matches!(flat, InvokePayload::Flat(fields) if fields.contains_key("tracking_id")));

        assert!(InvokePayload::try_from(json!(true)).is_err());
    }
}
