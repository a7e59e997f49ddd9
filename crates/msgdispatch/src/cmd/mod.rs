use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use msgdispatch_producer::{ProducerConfig, TrackingIdPolicy};
use msgdispatch_schema::{Behavior, SecurityLevel};
use serde_json::Value;

use crate::exit::{io_error, producer_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod envinfo;
pub mod invoke;
pub mod send;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a message and POST it to the producer endpoint.
    Send(SendArgs),
    /// Validate a message and invoke the producer function.
    Invoke(InvokeArgs),
    /// Validate a message and print it with defaults applied.
    Validate(ValidateArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Check credentials, schema, and configuration.
    Doctor(DoctorArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Invoke(args) => invoke::run(args, format),
        Command::Validate(args) => validate::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

/// Where the message comes from.
#[derive(Args, Debug, Default)]
pub struct MessageArgs {
    /// Complete message as a JSON object.
    #[arg(long, conflicts_with_all = ["file", "event_type"])]
    pub json: Option<String>,
    /// Read the complete message from a JSON file.
    #[arg(long, conflicts_with_all = ["json", "event_type"])]
    pub file: Option<PathBuf>,
    /// Build the message from fields: event type.
    #[arg(long, requires = "channel")]
    pub event_type: Option<String>,
    /// Message channel (with --event-type).
    #[arg(long, requires = "event_type")]
    pub channel: Option<String>,
    /// Payload JSON object (with --event-type). Default: {}.
    #[arg(long, requires = "event_type")]
    pub payload: Option<String>,
    /// Security level (with --event-type). Default: normal.
    #[arg(long, requires = "event_type")]
    pub security_level: Option<SecurityLevel>,
    /// Behavior (with --event-type). Default: MSGDISPATCH_BEHAVIOR or instant.
    #[arg(long, requires = "event_type")]
    pub behavior: Option<Behavior>,
}

impl MessageArgs {
    pub fn resolve(&self, config: &ProducerConfig) -> CliResult<Value> {
        if let Some(json) = &self.json {
            return serde_json::from_str(json)
                .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
        }
        if let Some(path) = &self.file {
            let text = fs::read_to_string(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
            return serde_json::from_str(&text).map_err(|err| {
                CliError::new(
                    DATA_INVALID,
                    format!("{} is not valid JSON: {err}", path.display()),
                )
            });
        }
        if let (Some(event_type), Some(channel)) = (&self.event_type, &self.channel) {
            let payload = match &self.payload {
                Some(text) => serde_json::from_str(text).map_err(|err| {
                    CliError::new(USAGE, format!("--payload is not valid JSON: {err}"))
                })?,
                None => Value::Object(Default::default()),
            };
            let mut message = config.message(
                event_type.clone(),
                channel.clone(),
                payload,
                self.security_level,
            );
            if let Some(behavior) = self.behavior {
                message = message.with_behavior(behavior);
            }
            return message.to_value().map_err(|err| {
                CliError::new(DATA_INVALID, format!("failed to encode message: {err}"))
            });
        }
        Err(CliError::new(
            USAGE,
            "no message given: use --json, --file, or --event-type with --channel",
        ))
    }
}

/// Settings shared by every command that loads the schema.
#[derive(Args, Debug, Default)]
pub struct SchemaArgs {
    /// Schema file to validate against. Default: the installed schema.
    #[arg(long, value_name = "PATH", env = "MSGDISPATCH_SCHEMA_PATH")]
    pub schema: Option<PathBuf>,
    /// Use the schema compiled into the binary when no path is given.
    #[arg(long)]
    pub bundled_schema: bool,
    /// Reject message keys the schema does not declare.
    #[arg(long)]
    pub strict: bool,
}

/// Settings shared by the delivery commands.
#[derive(Args, Debug, Default)]
pub struct DeliveryArgs {
    /// Signing region.
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
    /// Request timeout (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Accept success responses that carry no tracking id.
    #[arg(long)]
    pub allow_missing_tracking_id: bool,
    #[command(flatten)]
    pub schema: SchemaArgs,
}

impl SchemaArgs {
    /// Environment configuration with flags applied on top.
    pub fn config(&self) -> CliResult<ProducerConfig> {
        let mut config =
            ProducerConfig::from_env().map_err(|err| producer_error("invalid environment", err))?;
        if let Some(path) = &self.schema {
            config.schema_path = Some(path.clone());
        }
        if self.strict {
            config.strict_schema = true;
        }
        if self.bundled_schema {
            config.bundled_schema = true;
        }
        Ok(config)
    }
}

impl DeliveryArgs {
    pub fn config(&self) -> CliResult<ProducerConfig> {
        let mut config = self.schema.config()?;
        if let Some(region) = self.region.as_ref().filter(|r| !r.trim().is_empty()) {
            config.region = region.trim().to_string();
        }
        if let Some(timeout) = &self.timeout {
            config.timeout = parse_duration(timeout)?;
        }
        if self.allow_missing_tracking_id {
            config.tracking_id_policy = TrackingIdPolicy::Permissive;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Producer endpoint URL.
    #[arg(long, env = "MSGDISPATCH_PRODUCER_URL")]
    pub url: Option<String>,
    /// Signing service name.
    #[arg(long, env = "AWS_SERVICE")]
    pub service: Option<String>,
    #[command(flatten)]
    pub delivery: DeliveryArgs,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Function name or ARN.
    #[arg(long, env = "MSGDISPATCH_PRODUCER_FUNCTION")]
    pub function: Option<String>,
    /// Invocation endpoint override (scheme and host).
    #[arg(long, value_name = "URL", env = "MSGDISPATCH_INVOKE_ENDPOINT")]
    pub endpoint: Option<String>,
    #[command(flatten)]
    pub delivery: DeliveryArgs,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

/// `5s`, `500ms`, or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    use std::time::Duration;

    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn message_from_fields_gets_configured_defaults() {
        let args = MessageArgs {
            event_type: Some("user.login".to_string()),
            channel: Some("email".to_string()),
            payload: Some(r#"{"user_id":1}"#.to_string()),
            ..MessageArgs::default()
        };
        let message = args.resolve(&ProducerConfig::default()).unwrap();
        assert_eq!(message["event_type"], "user.login");
        assert_eq!(message["message_channel"], "email");
        assert_eq!(message["behavior"], "instant");
        assert_eq!(message["payload"]["user_id"], 1);
        assert!(message.get("security_level").is_none());
    }

    #[test]
    fn message_from_json_is_passed_through() {
        let args = MessageArgs {
            json: Some(r#"{"event_type":"x"}"#.to_string()),
            ..MessageArgs::default()
        };
        let message = args.resolve(&ProducerConfig::default()).unwrap();
        assert_eq!(message, serde_json::json!({"event_type": "x"}));
    }

    #[test]
    fn missing_message_is_usage_error() {
        let err = MessageArgs::default()
            .resolve(&ProducerConfig::default())
            .unwrap_err();
        assert_eq!(err.code, USAGE);

        let args = MessageArgs {
            json: Some("{nope".to_string()),
            ..MessageArgs::default()
        };
        assert_eq!(
            args.resolve(&ProducerConfig::default()).unwrap_err().code,
            USAGE
        );
    }
}
