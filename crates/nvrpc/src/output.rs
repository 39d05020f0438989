use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nvrpc_codec::{encode, Value};
use nvrpc_session::{Message, Notification};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// MessagePack bytes, re-encoded canonically.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// One decoded value together with how it reads as a msgpack-RPC message.
pub struct Record {
    pub index: usize,
    /// `request`, `response`, `notification`, or `value` for anything else.
    pub kind: &'static str,
    pub value: Value,
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    index: usize,
    kind: &'a str,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct NotificationOutput<'a> {
    batch: usize,
    method: &'a str,
    params: serde_json::Value,
}

/// Print the result of a call.
pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json_line(&to_json(value))),
        OutputFormat::Table => {
            let mut table = new_table(vec!["KIND", "VALUE"]);
            table.add_row(vec![value.kind().to_string(), value.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{value}"),
        OutputFormat::Raw => print_raw(&encode(value)),
    }
}

pub fn print_records(records: &[Record], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for record in records {
                let out = RecordOutput {
                    index: record.index,
                    kind: record.kind,
                    value: to_json(&record.value),
                };
                println!("{}", json_line(&out));
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "KIND", "VALUE"]);
            for record in records {
                table.add_row(vec![
                    record.index.to_string(),
                    record.kind.to_string(),
                    record.value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                println!("#{} {} {}", record.index, record.kind, record.value);
            }
        }
        OutputFormat::Raw => {
            for record in records {
                print_raw(&encode(&record.value));
            }
        }
    }
}

/// Print one inbound notification batch.
pub fn print_batch(batch_index: usize, batch: &[Notification], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for notification in batch {
                let out = NotificationOutput {
                    batch: batch_index,
                    method: &notification.method,
                    params: to_json(&Value::Array(notification.params.clone())),
                };
                println!("{}", json_line(&out));
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["BATCH", "METHOD", "PARAMS"]);
            for notification in batch {
                table.add_row(vec![
                    batch_index.to_string(),
                    notification.method.clone(),
                    Value::Array(notification.params.clone()).to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for notification in batch {
                println!(
                    "[{batch_index}] {} {}",
                    notification.method,
                    Value::Array(notification.params.clone())
                );
            }
        }
        OutputFormat::Raw => {
            for notification in batch {
                print_raw(&encode(&Message::from(notification.clone()).into_value()));
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// JSON form of a value. Values JSON cannot express (binary, extension,
/// non-string keys, non-finite floats) fall back to their display string.
pub fn to_json(value: &Value) -> serde_json::Value {
    value
        .to_json()
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}

fn json_line<T: Serialize>(out: &T) -> String {
    serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
