use std::sync::Arc;
use std::time::Instant;

use msgdispatch_schema::{
    FileSchemaSource, SchemaError, SchemaValidator, StaticSchemaSource, ValidatedMessage,
    ValidatorConfig,
};
use msgdispatch_sign::RequestSigner;
use msgdispatch_transport::{
    FunctionInvoke, FunctionInvokeTransport, HttpConfig, HttpSend, HttpTransport,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{
    ProducerConfig, BUNDLED_SCHEMA_VAR, PRODUCER_FUNCTION_VAR, PRODUCER_URL_VAR, SCHEMA_PATH_VAR,
};
use crate::error::{ProducerError, Result};
use crate::normalize::ResponseNormalizer;
use crate::outcome::{Receipt, Route};

/// Validates messages and delivers them over one of two transports.
///
/// Each send is validate, then one transport call, then normalize. An
/// invalid message never reaches the signer or the network. The compiled
/// schema is the only state shared between calls.
#[derive(Debug)]
pub struct Producer<H = HttpTransport, F = FunctionInvokeTransport> {
    config: ProducerConfig,
    validator: Arc<SchemaValidator>,
    signer: RequestSigner,
    http: H,
    invoker: F,
    normalizer: ResponseNormalizer,
}

impl Producer {
    /// Producer with the real transports.
    pub fn new(config: ProducerConfig, signer: RequestSigner) -> Result<Self> {
        let validator = Arc::new(load_validator(&config)?);
        let http = HttpTransport::with_config(HttpConfig::default().with_timeout(config.timeout))?;
        let mut invoker = FunctionInvokeTransport::with_http(signer.clone(), http.clone());
        if let Some(endpoint) = &config.invoke_endpoint {
            invoker = invoker.with_endpoint(endpoint.clone());
        }
        Ok(Self::from_parts(config, validator, signer, http, invoker))
    }

    /// Configuration and credentials both read from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(ProducerConfig::from_env()?, RequestSigner::from_env())
    }
}

impl<H: HttpSend, F: FunctionInvoke> Producer<H, F> {
    pub fn from_parts(
        config: ProducerConfig,
        validator: Arc<SchemaValidator>,
        signer: RequestSigner,
        http: H,
        invoker: F,
    ) -> Self {
        let normalizer = ResponseNormalizer::new(config.tracking_id_policy);
        Self {
            config,
            validator,
            signer,
            http,
            invoker,
            normalizer,
        }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn validator(&self) -> &Arc<SchemaValidator> {
        &self.validator
    }

    /// Validate without sending.
    pub fn validate(&self, message: &Value) -> Result<ValidatedMessage> {
        Ok(self.validator.validate(message)?)
    }

    /// Validate, sign, POST to `url`, and normalize the response.
    pub fn send_via_url(
        &self,
        url: &str,
        message: &Value,
        region: &str,
        service: &str,
    ) -> Result<Receipt> {
        let started = Instant::now();
        let validated = self.validator.validate(message)?;
        let body = encode(&validated)?;

        let request = self.signer.sign_bytes(url, body, region, service, &[])?;
        let response = self.http.post(request)?;
        debug!(url, status = response.status, "endpoint responded");
        let tracking_id = self.normalizer.normalize_http(&response).into_result()?;

        let receipt = Receipt {
            tracking_id,
            route: Route::Url(url.to_string()),
            region: region.to_string(),
            security_level: validated.security_level(),
            elapsed: started.elapsed(),
        };
        log_delivery(&receipt);
        Ok(receipt)
    }

    /// Validate, invoke `function` synchronously, and normalize the result.
    pub fn send_via_function(
        &self,
        function: &str,
        message: &Value,
        region: &str,
    ) -> Result<Receipt> {
        let started = Instant::now();
        let validated = self.validator.validate(message)?;
        let payload = encode(&validated)?;

        let response = self.invoker.invoke(function, payload, region)?;
        debug!(
            function,
            status = response.status,
            function_error = response.function_error.as_deref(),
            "function responded"
        );
        let tracking_id = self.normalizer.normalize_invoke(&response).into_result()?;

        let receipt = Receipt {
            tracking_id,
            route: Route::Function(function.to_string()),
            region: region.to_string(),
            security_level: validated.security_level(),
            elapsed: started.elapsed(),
        };
        log_delivery(&receipt);
        Ok(receipt)
    }

    /// [`send_via_url`](Self::send_via_url) with the configured URL, region,
    /// and service.
    pub fn send_to_default_url(&self, message: &Value) -> Result<Receipt> {
        let url = self.config.producer_url.as_deref().ok_or_else(|| {
            ProducerError::Config(format!("no producer URL configured (set {PRODUCER_URL_VAR})"))
        })?;
        self.send_via_url(url, message, &self.config.region, &self.config.service)
    }

    /// [`send_via_function`](Self::send_via_function) with the configured
    /// function and region.
    pub fn send_to_default_function(&self, message: &Value) -> Result<Receipt> {
        let function = self.config.function.as_deref().ok_or_else(|| {
            ProducerError::Config(format!(
                "no producer function configured (set {PRODUCER_FUNCTION_VAR})"
            ))
        })?;
        self.send_via_function(function, message, &self.config.region)
    }
}

/// Compile the schema `config` points at.
///
/// An explicit path must load. The bundled schema is used only when
/// `bundled_schema` is set. Otherwise the default file locations are
/// searched, and a [`ProducerError::Config`] is returned when none of them
/// can be read.
pub fn load_validator(config: &ProducerConfig) -> Result<SchemaValidator> {
    load_validator_with(config, &FileSchemaSource::default_locations())
}

fn load_validator_with(
    config: &ProducerConfig,
    defaults: &FileSchemaSource,
) -> Result<SchemaValidator> {
    let validator_config = ValidatorConfig {
        strict_mode: config.strict_schema,
        ..ValidatorConfig::default()
    };

    let validator = match &config.schema_path {
        Some(path) => SchemaValidator::from_source_with_config(
            &FileSchemaSource::single(path.clone()),
            validator_config,
        )?,
        None if config.bundled_schema => {
            SchemaValidator::from_source_with_config(&StaticSchemaSource::bundled(), validator_config)?
        }
        None => SchemaValidator::from_source_with_config(defaults, validator_config).map_err(
            |err| match err {
                SchemaError::LoadFailed(reason) => ProducerError::Config(format!(
                    "no schema found in the default locations ({reason}); \
                     set {SCHEMA_PATH_VAR} or {BUNDLED_SCHEMA_VAR}"
                )),
                other => other.into(),
            },
        )?,
    };
    debug!(origin = validator.origin(), "schema loaded");
    Ok(validator)
}

fn encode(validated: &ValidatedMessage) -> Result<bytes::Bytes> {
    validated
        .to_bytes()
        .map_err(|err| ProducerError::Validation(format!("message cannot be encoded: {err}")))
}

fn log_delivery(receipt: &Receipt) {
    info!(
        target_kind = match receipt.route {
            Route::Url(_) => "url",
            Route::Function(_) => "function",
        },
        target = receipt.route.target(),
        tracking_id = receipt.tracking_id.as_deref(),
        security_level = %receipt.security_level,
        elapsed_ms = receipt.elapsed.as_millis() as u64,
        "message delivered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::normalize::TrackingIdPolicy;
    use bytes::Bytes;
    use msgdispatch_schema::SecurityLevel;
    use msgdispatch_sign::{Credentials, CredentialsProvider, SignError, SignedRequest};
    use msgdispatch_transport::{InvokeResponse, RawResponse};
    use serde_json::json;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct MockHttp {
        response: RawResponse,
        sent: RefCell<Vec<SignedRequest>>,
    }

    impl MockHttp {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: RawResponse::new(status, body.to_string()),
                sent: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.sent.borrow().len()
        }
    }

    impl HttpSend for MockHttp {
        fn post(&self, request: SignedRequest) -> msgdispatch_transport::Result<RawResponse> {
            self.sent.borrow_mut().push(request);
            Ok(self.response.clone())
        }
    }

    struct MockInvoke {
        response: InvokeResponse,
        sent: RefCell<Vec<(String, Bytes, String)>>,
    }

    impl MockInvoke {
        fn new(response: InvokeResponse) -> Self {
            Self {
                response,
                sent: RefCell::new(Vec::new()),
            }
        }

        fn returning(status: u16, payload: Value) -> Self {
            Self::new(InvokeResponse::new(status, payload.to_string()))
        }

        fn calls(&self) -> usize {
            self.sent.borrow().len()
        }
    }

    impl FunctionInvoke for MockInvoke {
        fn invoke(
            &self,
            function: &str,
            payload: Bytes,
            region: &str,
        ) -> msgdispatch_transport::Result<InvokeResponse> {
            self.sent
                .borrow_mut()
                .push((function.to_string(), payload, region.to_string()));
            Ok(self.response.clone())
        }
    }

    struct NoCredentials;

    impl CredentialsProvider for NoCredentials {
        fn credentials(&self) -> msgdispatch_sign::Result<Credentials> {
            Err(SignError::MissingCredentials(
                "AWS_ACCESS_KEY_ID is not set".to_string(),
            ))
        }
    }

    fn signer() -> RequestSigner {
        RequestSigner::new(Credentials::new("AKIDEXAMPLE", "secret"))
    }

    fn producer<'a>(
        config: ProducerConfig,
        http: &'a MockHttp,
        invoker: &'a MockInvoke,
    ) -> Producer<&'a MockHttp, &'a MockInvoke> {
        let validator = Arc::new(SchemaValidator::bundled().unwrap());
        Producer::from_parts(config, validator, signer(), http, invoker)
    }

    fn message() -> Value {
        json!({
            "event_type": "user.login",
            "message_channel": "email",
            "behavior": "instant",
            "payload": {"user_id": 42}
        })
    }

    #[test]
    fn test_url_delivery_sends_validated_copy() {
        let http = MockHttp::new(200, r#"{"tracking_id":"trk-1"}"#);
        let invoker = MockInvoke::returning(200, json!({}));
        let producer = producer(ProducerConfig::default(), &http, &invoker);
        let input = message();

        let receipt = producer
            .send_via_url("https://api.example.com/produce", &input, "ap-southeast-2", "lambda")
            .unwrap();
        assert_eq!(receipt.tracking_id.as_deref(), Some("trk-1"));
        assert_eq!(receipt.security_level, SecurityLevel::Normal);
        assert_eq!(receipt.route, Route::Url("https://api.example.com/produce".into()));
        assert_eq!(input, message(), "caller's message must not change");

        let sent = http.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(invoker.calls(), 0);
        let body: Value = serde_json::from_slice(sent[0].body()).unwrap();
        assert_eq!(body["security_level"], "normal");
        assert_eq!(body["payload"], json!({"user_id": 42}));
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        assert!(sent[0]
            .header("authorization")
            .unwrap()
            .contains("/ap-southeast-2/lambda/aws4_request"));
    }

    #[test]
    fn test_invalid_message_never_reaches_transport() {
        let http = MockHttp::new(200, r#"{"tracking_id":"never"}"#);
        let invoker = MockInvoke::returning(200, json!({"tracking_id": "never"}));
        let producer = producer(ProducerConfig::default(), &http, &invoker);

        for field in ["event_type", "message_channel", "behavior", "payload"] {
            let mut incomplete = message();
            incomplete.as_object_mut().unwrap().remove(field);

            let err = producer
                .send_via_url("https://api.example.com", &incomplete, "us-east-1", "lambda")
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Validation);
            assert!(err.to_string().contains(field), "{err} should name {field}");

            let err = producer
                .send_via_function("my-fn", &incomplete, "us-east-1")
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Validation);
        }

        let mut bad_level = message();
        bad_level["security_level"] = json!("secret");
        let err = producer
            .send_via_function("my-fn", &bad_level, "us-east-1")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation);

        assert_eq!(http.calls(), 0);
        assert_eq!(invoker.calls(), 0);
    }

    #[test]
    fn test_url_error_status_is_application() {
        let http = MockHttp::new(500, "internal error");
        let invoker = MockInvoke::returning(200, json!({}));
        let producer = producer(ProducerConfig::default(), &http, &invoker);

        let err = producer
            .send_via_url("https://api.example.com", &message(), "us-east-1", "lambda")
            .unwrap_err();
        assert!(matches!(
            err,
            ProducerError::Application { status: 500, ref body } if body == "internal error"
        ));
        assert_eq!(http.calls(), 1);
    }

    #[test]
    fn test_missing_credentials_is_auth_and_sends_nothing() {
        let http = MockHttp::new(200, r#"{"tracking_id":"x"}"#);
        let invoker = MockInvoke::returning(200, json!({}));
        let validator = Arc::new(SchemaValidator::bundled().unwrap());
        let producer = Producer::from_parts(
            ProducerConfig::default(),
            validator,
            RequestSigner::new(NoCredentials),
            &http,
            &invoker,
        );

        let err = producer
            .send_via_url("https://api.example.com", &message(), "us-east-1", "lambda")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Auth);
        assert_eq!(http.calls(), 0);
    }

    #[test]
    fn test_function_delivery_flat_and_gateway() {
        let http = MockHttp::new(200, "{}");

        let invoker = MockInvoke::returning(200, json!({"tracking_id": "abc"}));
        let receipt = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_function("arn:aws:lambda:us-east-1:1:function:f", &message(), "us-east-1")
            .unwrap();
        assert_eq!(receipt.tracking_id.as_deref(), Some("abc"));

        let (function, payload, region) = invoker.sent.borrow()[0].clone();
        assert_eq!(function, "arn:aws:lambda:us-east-1:1:function:f");
        assert_eq!(region, "us-east-1");
        let payload: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(payload["security_level"], "normal");

        let invoker = MockInvoke::returning(
            200,
            json!({"statusCode": 200, "body": "{\"tracking_id\":\"xyz\"}"}),
        );
        let receipt = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_function("f", &message(), "us-east-1")
            .unwrap();
        assert_eq!(receipt.tracking_id.as_deref(), Some("xyz"));
        assert_eq!(http.calls(), 0);
    }

    #[test]
    fn test_function_failures_classified() {
        let http = MockHttp::new(200, "{}");

        let invoker = MockInvoke::returning(
            200,
            json!({"statusCode": 400, "body": "{\"error\":\"bad\"}"}),
        );
        let err = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_function("f", &message(), "us-east-1")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Application);

        let invoker = MockInvoke::new(InvokeResponse::new(500, "not json at all"));
        let err = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_function("f", &message(), "us-east-1")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(err.is_retryable());

        let invoker = MockInvoke::new(
            InvokeResponse::new(200, r#"{"errorMessage":"boom"}"#).with_function_error("Unhandled"),
        );
        let err = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_function("f", &message(), "us-east-1")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Application);

        let invoker = MockInvoke::returning(200, json!(["unexpected"]));
        let err = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_function("f", &message(), "us-east-1")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Protocol);
    }

    #[test]
    fn test_tracking_id_policy_from_config() {
        let http = MockHttp::new(200, r#"{"status":"queued"}"#);
        let invoker = MockInvoke::returning(200, json!({}));

        let err = producer(ProducerConfig::default(), &http, &invoker)
            .send_via_url("https://api.example.com", &message(), "us-east-1", "lambda")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Protocol);

        let config = ProducerConfig {
            tracking_id_policy: TrackingIdPolicy::Permissive,
            ..ProducerConfig::default()
        };
        let receipt = producer(config, &http, &invoker)
            .send_via_url("https://api.example.com", &message(), "us-east-1", "lambda")
            .unwrap();
        assert_eq!(receipt.tracking_id, None);
    }

    #[test]
    fn test_default_targets_from_config() {
        let http = MockHttp::new(200, r#"{"tracking_id":"u"}"#);
        let invoker = MockInvoke::returning(200, json!({"tracking_id": "f"}));

        let unconfigured = producer(ProducerConfig::default(), &http, &invoker);
        let err = unconfigured.send_to_default_url(&message()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        assert!(err.to_string().contains(PRODUCER_URL_VAR));
        let err = unconfigured.send_to_default_function(&message()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        assert_eq!(http.calls() + invoker.calls(), 0);

        let config = ProducerConfig {
            producer_url: Some("https://api.example.com/produce".to_string()),
            function: Some("message-producer".to_string()),
            region: "eu-west-1".to_string(),
            service: "execute-api".to_string(),
            ..ProducerConfig::default()
        };
        let configured = producer(config, &http, &invoker);

        let receipt = configured.send_to_default_url(&message()).unwrap();
        assert_eq!(receipt.tracking_id.as_deref(), Some("u"));
        assert_eq!(receipt.region, "eu-west-1");
        assert!(http.sent.borrow()[0]
            .header("authorization")
            .unwrap()
            .contains("/eu-west-1/execute-api/aws4_request"));

        let receipt = configured.send_to_default_function(&message()).unwrap();
        assert_eq!(receipt.tracking_id.as_deref(), Some("f"));
        assert_eq!(invoker.sent.borrow()[0].0, "message-producer");
        assert_eq!(invoker.sent.borrow()[0].2, "eu-west-1");
    }

    #[test]
    fn test_load_validator() {
        let validator = load_validator(&ProducerConfig::default()).unwrap();
        assert!(validator.is_valid(&message()));

        let config = ProducerConfig {
            schema_path: Some("/nonexistent/msgdispatch/schema.json".into()),
            ..ProducerConfig::default()
        };
        let err = load_validator(&config).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);

        let config = ProducerConfig {
            strict_schema: true,
            ..ProducerConfig::default()
        };
        let validator = load_validator(&config).unwrap();
        assert!(validator.is_valid(&message()));
        let mut extra = message();
        extra["unexpected"] = json!(true);
        assert!(!validator.is_valid(&extra));
    }

    #[test]
    fn test_unreadable_default_locations_are_config_error() {
        let nowhere = FileSchemaSource::new([
            PathBuf::from("/nonexistent/msgdispatch/installed.schema.json"),
            PathBuf::from("/nonexistent/msgdispatch/project.schema.json"),
        ]);

        let err = load_validator_with(&ProducerConfig::default(), &nowhere).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        assert!(err.to_string().contains(SCHEMA_PATH_VAR));

        let bundled = ProducerConfig {
            bundled_schema: true,
            ..ProducerConfig::default()
        };
        let validator = load_validator_with(&bundled, &nowhere).unwrap();
        assert_eq!(validator.origin(), "bundled");
        assert!(validator.is_valid(&message()));
    }

    #[test]
    fn test_producer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Producer>();
    }
}
