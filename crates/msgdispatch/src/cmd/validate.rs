use msgdispatch_producer::load_validator;

use crate::cmd::ValidateArgs;
use crate::exit::{producer_error, CliResult, SUCCESS};
use crate::output::{print_validated, OutputFormat};

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.schema.config()?;
    let message = args.message.resolve(&config)?;

    let validator = load_validator(&config).map_err(|err| producer_error("schema", err))?;
    let validated = validator
        .validate(&message)
        .map_err(|err| producer_error("validation failed", err.into()))?;

    print_validated(&validated, format);
    Ok(SUCCESS)
}
