use tracing::info;

use crate::cmd::{open_session, parse_duration, parse_params, runtime, CallArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_value, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let params = parse_params(&args.params)?;
    let timeout = parse_duration(&args.timeout)?;

    let result = runtime()?.block_on(async {
        let (session, _notifications) = open_session(&args.path).await?;
        info!(path = %args.path.display(), method = %args.method, "calling");

        match tokio::time::timeout(timeout, session.call(&args.method, params)).await {
            Ok(result) => result.map_err(|err| session_error("call failed", err)),
            Err(_) => Err(CliError::new(
                TIMEOUT,
                format!("no response to {} within {timeout:?}", args.method),
            )),
        }
    })?;

    print_value(&result, format);
    Ok(SUCCESS)
}
