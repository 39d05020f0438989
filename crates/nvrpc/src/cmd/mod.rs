use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use nvrpc_codec::Value;
use nvrpc_session::{Driver, Notifications, Session, SessionConfig};
use nvrpc_transport::{ChunkStream, UnixWriter};
use tracing::debug;

use crate::exit::{io_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod decode;
pub mod notify;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Call a method and print its result.
    Call(CallArgs),
    /// Send a request without waiting for the response.
    Notify(NotifyArgs),
    /// Print notifications as they arrive.
    Watch(WatchArgs),
    /// Decode a MessagePack capture and classify each value.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Notify(args) => notify::run(args),
        Command::Watch(args) => watch::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to (e.g. the address given to `nvim --listen`).
    pub path: PathBuf,
    /// Method name, e.g. nvim_get_api_info.
    pub method: String,
    /// Parameters as a JSON array.
    #[arg(long, default_value = "[]")]
    pub params: String,
    /// Give up waiting for the response after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Method name.
    pub method: String,
    /// Parameters as a JSON array.
    #[arg(long, default_value = "[]")]
    pub params: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Event to subscribe to with nvim_subscribe before watching (repeatable).
    #[arg(long, value_name = "EVENT")]
    pub subscribe: Vec<String>,
    /// Exit after N notification batches.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
    /// Print every value that decoded before a truncated tail instead of failing.
    #[arg(long)]
    pub allow_partial: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

type UnixSession = Session<UnixWriter>;

/// Single-threaded runtime for one command.
pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

/// Connect to a socket and start the session's read loop.
pub(crate) async fn open_session(path: &Path) -> CliResult<(UnixSession, Notifications)> {
    let (inbound, writer) = nvrpc_transport::connect(path)
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let (session, notifications, driver) =
        Session::new(inbound, writer, SessionConfig::default());
    tokio::spawn(drive(driver));
    Ok((session, notifications))
}

async fn drive<R: ChunkStream>(driver: Driver<R>) {
    if let Err(err) = driver.run().await {
        debug!(%err, "session ended with an error");
    }
}

/// Parse `--params`: a JSON array, each element converted to a [`Value`].
pub(crate) fn parse_params(json: &str) -> CliResult<Vec<Value>> {
    let parsed: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| CliError::new(USAGE, format!("--params is not valid JSON: {err}")))?;
    match Value::from_json(&parsed) {
        Value::Array(params) => Ok(params),
        other => Err(CliError::new(
            USAGE,
            format!("--params must be a JSON array, got {}", other.kind()),
        )),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input:?}")))?;
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

    #[test]
    fn params_must_be_a_json_array() {
        assert_eq!(
            parse_params(r#"[1, "two", null]"#).unwrap(),
            vec![Value::from(1), Value::from("two"), Value::Nil]
        );
        assert_eq!(parse_params(r#"{"a": 1}"#).unwrap_err().code, USAGE);
        assert_eq!(parse_params("[1,").unwrap_err().code, USAGE);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("soon").unwrap_err().code, USAGE);
    }
}
