use tracing::info;

use crate::cmd::{open_session, parse_params, runtime, NotifyArgs};
use crate::exit::{session_error, CliResult, SUCCESS};

pub fn run(args: NotifyArgs) -> CliResult<i32> {
    let params = parse_params(&args.params)?;

    runtime()?.block_on(async {
        let (session, _notifications) = open_session(&args.path).await?;
        session
            .fast_call(&args.method, params)
            .await
            .map_err(|err| session_error("send failed", err))?;
        info!(method = %args.method, "request sent");
        Ok(SUCCESS)
    })
}
