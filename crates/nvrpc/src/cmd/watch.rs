use nvrpc_codec::Value;
use tracing::info;

use crate::cmd::{open_session, runtime, WatchArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_batch, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    runtime()?.block_on(async {
        let (session, mut notifications) = open_session(&args.path).await?;

        for event in &args.subscribe {
            session
                .call("nvim_subscribe", vec![Value::from(event.as_str())])
                .await
                .map_err(|err| session_error(&format!("subscribe to {event} failed"), err))?;
            info!(%event, "subscribed");
        }

        let mut seen = 0usize;
        while args.count.is_none_or(|count| seen < count) {
            tokio::select! {
                batch = notifications.recv() => match batch {
                    Some(batch) => {
                        print_batch(seen, &batch, format);
                        seen += 1;
                    }
                    None => {
                        info!("session closed");
                        break;
                    }
                },
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|err| io_error("failed to listen for ctrl-c", err))?;
                    info!("interrupted");
                    break;
                }
            }
        }
        Ok(SUCCESS)
    })
}
