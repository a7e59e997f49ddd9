use std::collections::BTreeMap;

use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

/// Reported as set or unset only.
const SECRET_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
];

const PLAIN_VARS: &[&str] = &[
    "AWS_REGION",
    "AWS_SERVICE",
    "MSGDISPATCH_PRODUCER_URL",
    "MSGDISPATCH_PRODUCER_FUNCTION",
    "MSGDISPATCH_INVOKE_ENDPOINT",
    "MSGDISPATCH_BEHAVIOR",
    "MSGDISPATCH_SCHEMA_PATH",
    "MSGDISPATCH_TIMEOUT_SECS",
    "MSGDISPATCH_ALLOW_MISSING_TRACKING_ID",
    "MSGDISPATCH_STRICT_SCHEMA",
    "MSGDISPATCH_BUNDLED_SCHEMA",
    "AWS_PROFILE",
    "AWS_SHARED_CREDENTIALS_FILE",
    "AWS_CONFIG_FILE",
    "RUST_LOG",
];

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    schema_id: &'static str,
    version: String,
    target: String,
    rust_version: String,
    git_hash: String,
    platform: PlatformInfo,
    features: Vec<String>,
    dependencies: BTreeMap<String, String>,
    environment: BTreeMap<String, Option<String>>,
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut deps = BTreeMap::new();
    deps.insert("clap".to_string(), "4.5".to_string());
    deps.insert("jsonschema".to_string(), "0.41".to_string());
    deps.insert("reqwest".to_string(), "0.12".to_string());

    let output = EnvInfoOutput {
        schema_id: "https://schemas.3leaps.dev/msgdispatch/cli/v1/envinfo.schema.json",
        version: env!("CARGO_PKG_VERSION").to_string(),
        target: target_triple(),
        rust_version: option_env!("RUSTC_VERSION")
            .unwrap_or("unknown")
            .to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        platform: PlatformInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        },
        features: active_features(),
        dependencies: deps,
        environment: environment(|name| std::env::var(name).ok()),
    };

    print_envinfo(&output, format);
    Ok(SUCCESS)
}

fn environment(lookup: impl Fn(&str) -> Option<String>) -> BTreeMap<String, Option<String>> {
    let mut env = BTreeMap::new();
    for name in PLAIN_VARS {
        env.insert(name.to_string(), lookup(name));
    }
    for name in SECRET_VARS {
        env.insert(name.to_string(), lookup(name).map(|_| "(set)".to_string()));
    }
    env
}

fn target_triple() -> String {
    if let Some(target) = option_env!("MSGDISPATCH_BUILD_TARGET") {
        return target.to_string();
    }

    match (std::env::consts::ARCH, std::env::consts::OS) {
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("x86_64", "windows") => "x86_64-pc-windows-msvc".to_string(),
        (arch, os) => format!("{arch}-unknown-{os}"),
    }
}

fn print_envinfo(output: &EnvInfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("msgdispatch environment\n");
            println!("  Version:    {}", output.version);
            println!("  Target:     {}", output.target);
            println!("  Rust:       {}", output.rust_version);
            println!("  Git hash:   {}", output.git_hash);
            println!(
                "  Platform:   {} ({})",
                output.platform.os, output.platform.arch
            );
            println!("  Features:   {}", output.features.join(", "));
            println!("\n  Dependencies:");
            for (k, v) in &output.dependencies {
                println!("    {:<12} {}", k, v);
            }
            println!("\n  Environment:");
            for (k, v) in &output.environment {
                println!("    {:<38} {}", k, v.as_deref().unwrap_or("(not set)"));
            }
        }
        OutputFormat::Raw => println!("{}", output.version),
    }
}

fn active_features() -> Vec<String> {
    let mut features = Vec::new();
    if cfg!(feature = "producer") {
        features.push("producer".to_string());
    }
    if cfg!(feature = "cli") {
        features.push("cli".to_string());
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_reported_as_set_only() {
        let env = environment(|name| match name {
            "AWS_SECRET_ACCESS_KEY" => Some("wJalrXUtnFEMI".to_string()),
            "AWS_REGION" => Some("us-east-1".to_string()),
            _ => None,
        });
        assert_eq!(env["AWS_SECRET_ACCESS_KEY"].as_deref(), Some("(set)"));
        assert_eq!(env["AWS_REGION"].as_deref(), Some("us-east-1"));
        assert_eq!(env["AWS_ACCESS_KEY_ID"], None);
    }

    #[test]
    fn target_looks_like_triple() {
        let target = target_triple();
        assert!(target.split('-').count() >= 3);
    }
}
