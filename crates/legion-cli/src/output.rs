//! §6 "structured records (JSON) by default; a human-oriented pretty
//! formatter exists but is not part of the contract" — unlike the
//! daemon-client CLI this is descended from, `Json` is the default here,
//! not `Text`.

use clap::ValueEnum;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

/// Renders one command's result to stdout.
pub fn emit(format: OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
        }
        OutputFormat::Text => println!("{}", render_text(value)),
    }
}

/// A flat, best-effort line for humans; not guaranteed stable across
/// releases the way the JSON shape is.
fn render_text(value: &Value) -> String {
    match value {
        Value::Null => "ok".to_string(),
        Value::Object(map) if map.is_empty() => "ok".to_string(),
        Value::Array(items) => format!("{} item(s)", items.len()),
        other => other.to_string(),
    }
}
