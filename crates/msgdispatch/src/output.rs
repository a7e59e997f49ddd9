use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use msgdispatch_producer::{Receipt, Route};
use msgdispatch_schema::ValidatedMessage;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReceiptOutput<'a> {
    schema_id: &'a str,
    #[serde(flatten)]
    receipt: &'a Receipt,
    timestamp: String,
}

pub fn print_receipt(receipt: &Receipt, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReceiptOutput {
                schema_id: "https://schemas.3leaps.dev/msgdispatch/cli/v1/delivery-receipt.schema.json",
                receipt,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TRACKING ID", "ROUTE", "TARGET", "REGION", "LEVEL", "MS"])
                .add_row(vec![
                    tracking_text(receipt).to_string(),
                    route_name(&receipt.route).to_string(),
                    receipt.route.target().to_string(),
                    receipt.region.clone(),
                    receipt.security_level.to_string(),
                    receipt.elapsed.as_millis().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "tracking_id={} route={} target={} region={} security_level={} elapsed_ms={}",
                tracking_text(receipt),
                route_name(&receipt.route),
                receipt.route.target(),
                receipt.region,
                receipt.security_level,
                receipt.elapsed.as_millis()
            );
        }
        OutputFormat::Raw => println!("{}", receipt.tracking_id.as_deref().unwrap_or("")),
    }
}

pub fn print_validated(message: &ValidatedMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(message),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in message.fields() {
                let value = match value.as_str() {
                    Some(text) => text.to_string(),
                    None => value.to_string(),
                };
                table.add_row(vec![key.clone(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}",
                serde_json::to_string_pretty(message).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Raw => match message.to_bytes() {
            Ok(bytes) => {
                print_raw(&bytes);
                println!();
            }
            Err(_) => println!("{{}}"),
        },
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn route_name(route: &Route) -> &'static str {
    match route {
        Route::Url(_) => "url",
        Route::Function(_) => "function",
    }
}

fn tracking_text(receipt: &Receipt) -> &str {
    receipt.tracking_id.as_deref().unwrap_or("(none)")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
