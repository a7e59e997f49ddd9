use msgdispatch_producer::Producer;
use msgdispatch_sign::RequestSigner;

use crate::cmd::SendArgs;
use crate::exit::{producer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_receipt, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = args.delivery.config()?;
    if let Some(service) = args.service.as_ref().filter(|s| !s.trim().is_empty()) {
        config.service = service.trim().to_string();
    }
    let url = args
        .url
        .clone()
        .or_else(|| config.producer_url.clone())
        .ok_or_else(|| {
            CliError::new(
                USAGE,
                "no producer URL: pass --url or set MSGDISPATCH_PRODUCER_URL",
            )
        })?;

    let message = args.message.resolve(&config)?;
    let region = config.region.clone();
    let service = config.service.clone();

    tracing::info!(
        url = %url,
        region = %region,
        event_type = message.get("event_type").and_then(|v| v.as_str()).unwrap_or_default(),
        "sending message"
    );

    let producer = Producer::new(config, RequestSigner::from_env())
        .map_err(|err| producer_error("setup failed", err))?;
    let receipt = producer
        .send_via_url(&url, &message, &region, &service)
        .map_err(|err| producer_error("send failed", err))?;

    tracing::info!(
        tracking_id = receipt.tracking_id.as_deref().unwrap_or_default(),
        route = ?receipt.route,
        elapsed_ms = receipt.elapsed.as_millis() as u64,
        "message delivered"
    );
    print_receipt(&receipt, format);
    Ok(SUCCESS)
}
