use std::env;
use std::path::PathBuf;

use crate::error::{LoggerError, Result};
use crate::format::Format;
use crate::level::Level;
use crate::logger::{DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL};
use crate::registry::InitOptions;

#[derive(Clone, Debug)]
pub struct Config {
    /// `None` means console-only output.
    pub log_file: Option<PathBuf>,
    pub rotate: bool,
    pub level: Level,
    pub format: Format,
    pub show_caller: bool,
    pub async_buffer_size: usize,
    pub flush_interval_secs: u64,
    pub server_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Missing keys
    /// take their defaults; present but malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let log_file = match lookup("LOG_FILE") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from("./logs/app.log")),
        };

        Ok(Config {
            log_file,
            rotate: lookup("LOG_ROTATE")
                .map(|v| parse_bool("LOG_ROTATE", &v))
                .transpose()?
                .unwrap_or(true),
            level: lookup("LOG_LEVEL")
                .map(|v| v.parse::<Level>())
                .transpose()?
                .unwrap_or(Level::Info),
            format: lookup("LOG_FORMAT")
                .map(|v| v.parse::<Format>())
                .transpose()?
                .unwrap_or_default(),
            show_caller: lookup("LOG_CALLER")
                .map(|v| parse_bool("LOG_CALLER", &v))
                .transpose()?
                .unwrap_or(true),
            async_buffer_size: lookup("LOG_ASYNC_BUFFER")
                .map(|v| parse_number::<usize>("LOG_ASYNC_BUFFER", &v))
                .transpose()?
                .unwrap_or(DEFAULT_BUFFER_SIZE),
            flush_interval_secs: lookup("LOG_FLUSH_INTERVAL_SECS")
                .map(|v| parse_number::<u64>("LOG_FLUSH_INTERVAL_SECS", &v))
                .transpose()?
                .unwrap_or(DEFAULT_FLUSH_INTERVAL.as_secs()),
            server_address: lookup("SERVER_ADDRESS")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn init_options(&self) -> InitOptions {
        InitOptions {
            target_file: self.log_file.clone(),
            rotation: self.rotate,
            async_buffer_size: self.async_buffer_size,
            async_flush_interval_secs: self.flush_interval_secs,
            level: self.level,
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoggerError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| LoggerError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
