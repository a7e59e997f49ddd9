use msgdispatch_producer::Producer;
use msgdispatch_sign::RequestSigner;

use crate::cmd::InvokeArgs;
use crate::exit::{producer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_receipt, OutputFormat};

pub fn run(args: InvokeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = args.delivery.config()?;
    if let Some(endpoint) = &args.endpoint {
        config.invoke_endpoint = Some(endpoint.clone());
    }
    let function = args
        .function
        .clone()
        .or_else(|| config.function.clone())
        .ok_or_else(|| {
            CliError::new(
                USAGE,
                "no producer function: pass --function or set MSGDISPATCH_PRODUCER_FUNCTION",
            )
        })?;

    let message = args.message.resolve(&config)?;
    let region = config.region.clone();

    tracing::info!(
        function = %function,
        region = %region,
        event_type = message.get("event_type").and_then(|v| v.as_str()).unwrap_or_default(),
        "invoking producer function"
    );

    let producer = Producer::new(config, RequestSigner::from_env())
        .map_err(|err| producer_error("setup failed", err))?;
    let receipt = producer
        .send_via_function(&function, &message, &region)
        .map_err(|err| producer_error("invoke failed", err))?;

    tracing::info!(
        tracking_id = receipt.tracking_id.as_deref().unwrap_or_default(),
        route = ?receipt.route,
        elapsed_ms = receipt.elapsed.as_millis() as u64,
        "message delivered"
    );
    print_receipt(&receipt, format);
    Ok(SUCCESS)
}
