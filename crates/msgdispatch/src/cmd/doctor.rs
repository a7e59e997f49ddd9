use msgdispatch_producer::{load_validator, ProducerConfig};
use msgdispatch_sign::RequestSigner;
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = match ProducerConfig::from_env() {
        Ok(config) => vec![
            CheckResult::new("config", CheckStatus::Pass, "environment settings parsed"),
            credentials_check(&RequestSigner::from_env()),
            region_check(&config),
            schema_check(&config),
            target_check("producer_url", config.producer_url.as_deref()),
            target_check("producer_function", config.function.as_deref()),
        ],
        Err(err) => vec![
            CheckResult::new("config", CheckStatus::Fail, err.to_string()),
            credentials_check(&RequestSigner::from_env()),
        ],
    };

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: "https://schemas.3leaps.dev/msgdispatch/cli/v1/doctor-report.schema.json",
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn credentials_check(signer: &RequestSigner) -> CheckResult {
    match signer.check_credentials() {
        Ok(()) => CheckResult::new(
            "credentials",
            CheckStatus::Pass,
            format!("signing keys available from {}", signer.provider_name()),
        ),
        Err(err) => CheckResult::new("credentials", CheckStatus::Fail, err.to_string()),
    }
}

fn region_check(config: &ProducerConfig) -> CheckResult {
    if std::env::var_os("AWS_REGION").is_some() {
        CheckResult::new("region", CheckStatus::Pass, config.region.clone())
    } else {
        CheckResult::new(
            "region",
            CheckStatus::Warn,
            format!("AWS_REGION not set, using {}", config.region),
        )
    }
}

fn schema_check(config: &ProducerConfig) -> CheckResult {
    match load_validator(config) {
        Ok(validator) => CheckResult::new(
            "schema",
            CheckStatus::Pass,
            format!("compiled from {}", validator.origin()),
        ),
        Err(err) => CheckResult::new("schema", CheckStatus::Fail, err.to_string()),
    }
}

fn target_check(name: &str, value: Option<&str>) -> CheckResult {
    match value {
        Some(value) => CheckResult::new(name, CheckStatus::Info, value),
        None => CheckResult::new(name, CheckStatus::Skip, "not configured"),
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("msgdispatch doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgdispatch_sign::Credentials;

    #[test]
    fn doctor_output_has_overall_status() {
        let output = DoctorOutput {
            schema_id: "x",
            checks: vec![CheckResult::new("x", CheckStatus::Pass, "ok")],
            overall: "pass",
        };
        let json = serde_json::to_string(&output).expect("doctor output should serialize");
        assert!(json.contains("\"overall\":\"pass\""));
        assert!(json.contains("\"status\":\"pass\""));
    }

    #[test]
    fn credentials_check_reports_provider() {
        let check = credentials_check(&RequestSigner::new(Credentials::new("AKID", "secret")));
        assert!(matches!(check.status, CheckStatus::Pass));
        assert!(check.detail.contains("static"));
    }

    #[test]
    fn schema_check_fails_for_missing_file() {
        let config = ProducerConfig {
            schema_path: Some("/nonexistent/msgdispatch.schema.json".into()),
            ..ProducerConfig::default()
        };
        assert!(matches!(schema_check(&config).status, CheckStatus::Fail));
        assert!(matches!(
            schema_check(&ProducerConfig::default()).status,
            CheckStatus::Pass
        ));
    }
}
