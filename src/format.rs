use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::LoggerError;
use crate::level::Level;
use crate::record::{Fields, LogRecord};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for Format {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "json" | "structured" => Ok(Format::Json),
            _ => Err(LoggerError::InvalidFormat(s.to_string())),
        }
    }
}

#[derive(Serialize)]
struct Entry<'a> {
    level: Level,
    timestamp: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a Fields>,
}

/// Render a record as a single line (without the trailing newline).
///
/// A record that cannot be serialized as JSON is rendered as text instead.
pub fn render(record: &LogRecord, format: Format, show_caller: bool) -> String {
    match format {
        Format::Text => render_text(record, show_caller),
        Format::Json => {
            render_json(record, show_caller).unwrap_or_else(|_| render_text(record, show_caller))
        }
    }
}

pub fn render_text(record: &LogRecord, show_caller: bool) -> String {
    let timestamp = record.timestamp.format(TIMESTAMP_FORMAT);
    let mut line = format!("[{}] {}", record.level, timestamp);

    if let Some(caller) = record.caller.as_deref().filter(|_| show_caller) {
        let _ = write!(line, " [{caller}]");
    }
    let _ = write!(line, " {}", record.message);

    if let Some(fields) = &record.fields {
        for (key, value) in fields.iter() {
            let _ = write!(line, " {key}={value}");
        }
    }
    line
}

pub fn render_json(record: &LogRecord, show_caller: bool) -> Result<String, serde_json::Error> {
    let timestamp = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
    let entry = Entry {
        level: record.level,
        timestamp: &timestamp,
        message: &record.message,
        caller: record.caller.as_deref().filter(|_| show_caller),
        fields: record.fields.as_ref(),
    };
    serde_json::to_string(&entry)
}
