use std::io::Read;
use std::path::Path;

use nvrpc_codec::{Decoder, ParseError, Value};
use nvrpc_session::Message;
use tracing::{debug, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, parse_error, CliResult, SUCCESS};
use crate::output::{print_records, OutputFormat, Record};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_input(args.file.as_deref())?;
    debug!(len = bytes.len(), "decoding capture");

    let values = match Decoder::decode_all(&bytes) {
        Ok(values) => values,
        Err(ParseError::Truncated { buffered }) if args.allow_partial => {
            warn!(buffered, "capture ends mid-value; ignoring the incomplete tail");
            let mut decoder = Decoder::new();
            decoder
                .feed(&bytes)
                .map_err(|err| parse_error("decode failed", err))?
        }
        Err(err) => return Err(parse_error("decode failed", err)),
    };

    let records: Vec<Record> = values.into_iter().enumerate().map(classify).collect();
    print_records(&records, format);
    Ok(SUCCESS)
}

fn read_input(file: Option<&Path>) -> CliResult<Vec<u8>> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        _ => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(bytes)
        }
    }
}

fn classify((index, value): (usize, Value)) -> Record {
    let kind = match Message::from_value(value.clone()) {
        Ok(message) => message.kind(),
        Err(_) => "value",
    };
    Record { index, kind, value }
}
