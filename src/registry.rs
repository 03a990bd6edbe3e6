//! The process-wide default logger.
//!
//! A [`Registry`] owns exactly one live [`Logger`]. Emits take a shared lock
//! on the slot for the duration of the emit; replacing the logger (a target
//! change) takes it exclusively, so no emit ever sees a half-migrated logger.
//! The free functions and the `debug!` .. `fatal!` macros forward to
//! [`global()`].

use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::error::Result;
use crate::format::Format;
use crate::level::Level;
use crate::logger::{Logger, LoggerOptions, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL};
use crate::record::Fields;
use crate::sink::Target;

/// Parameters of [`Registry::initialize`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// `None` keeps console-only output.
    pub target_file: Option<PathBuf>,
    pub rotation: bool,
    pub async_buffer_size: usize,
    pub async_flush_interval_secs: u64,
    pub level: Level,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_file: None,
            rotation: false,
            async_buffer_size: DEFAULT_BUFFER_SIZE,
            async_flush_interval_secs: DEFAULT_FLUSH_INTERVAL.as_secs(),
            level: Level::Info,
        }
    }
}

pub struct Registry {
    slot: RwLock<Arc<Logger>>,
}

impl Registry {
    pub fn new(logger: Logger) -> Self {
        Self {
            slot: RwLock::new(Arc::new(logger)),
        }
    }

    /// Handle to the live logger. It stays valid after a replacement, but a
    /// replaced logger has been closed and only writes to the console.
    pub fn current(&self) -> Arc<Logger> {
        self.slot.read().clone()
    }

    /// Install a fully built `logger`, closing and returning the previous
    /// one. Nothing carries over; use [`Registry::set_target`] to keep the
    /// current settings and only move the output.
    pub fn replace(&self, logger: Logger) -> Arc<Logger> {
        let mut slot = self.slot.write();
        let previous = std::mem::replace(&mut *slot, Arc::new(logger));
        previous.close();
        previous
    }

    /// Bring logging up for the lifetime of the process: target file,
    /// rotation, threshold and background delivery. A file that cannot be
    /// opened is reported, and logging carries on console-only.
    pub fn initialize(&self, options: InitOptions) -> Result<()> {
        // rotation first, so the new target opens straight onto today's file
        let mut result = if options.rotation {
            self.current().enable_rotation()
        } else {
            Ok(())
        };
        if let Some(path) = &options.target_file {
            let replaced = self.set_target(Target::file(path));
            if let Err(e) = &replaced {
                self.log(Level::Error, format_args!("failed to set log file: {e}"), None);
            }
            result = result.and(replaced);
        }

        let logger = self.current();
        logger.set_level(options.level);
        logger.enable_async(
            options.async_buffer_size,
            Duration::from_secs(options.async_flush_interval_secs),
        )?;

        self.log(
            Level::Info,
            format_args!(
                "logging initialized (rotation: {}, async buffer: {})",
                logger.rotation_enabled(),
                options.async_buffer_size
            ),
            None,
        );
        result
    }

    /// Replace the live logger with one writing to `target`. Every other
    /// setting carries over, including background delivery. Queued records
    /// are drained into the old target first.
    ///
    /// Unlike [`Logger::set_target`], which moves one logger in place, this
    /// swaps in a new instance under the slot lock. Handles obtained from
    /// [`Registry::current`] earlier keep pointing at the closed logger.
    pub fn set_target(&self, target: Target) -> Result<()> {
        let mut slot = self.slot.write();
        let mut config = slot.config();
        config.target = target;
        let clock = slot.clock();

        slot.close();
        let (logger, result) = Logger::open_with_clock(config, clock);
        *slot = Arc::new(logger);
        result
    }

    /// Apply every option that is set. Rotation goes first so that a new
    /// target opens straight onto its date-stamped name.
    pub fn configure(&self, mut options: LoggerOptions) -> Result<()> {
        let rotated = match options.rotation.take() {
            Some(true) => self.current().enable_rotation(),
            Some(false) => {
                self.current().disable_rotation();
                Ok(())
            }
            None => Ok(()),
        };
        let replaced = match options.target.take() {
            Some(target) => self.set_target(target),
            None => Ok(()),
        };
        let configured = self.current().configure(options);
        rotated.and(replaced).and(configured)
    }

    pub fn set_level(&self, level: Level) {
        self.slot.read().set_level(level);
    }

    pub fn set_format(&self, format: Format) {
        self.slot.read().set_format(format);
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.slot.read().enabled(level)
    }

    #[track_caller]
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>, fields: Option<Fields>) {
        self.slot.read().log(level, args, fields);
    }

    pub fn log_message(
        &self,
        level: Level,
        message: String,
        caller: Option<String>,
        fields: Option<Fields>,
    ) {
        self.slot.read().log_message(level, message, caller, fields);
    }

    pub fn flush(&self) {
        self.slot.read().flush();
    }

    /// Drain and close the live logger. Records emitted afterwards still
    /// reach the console.
    pub fn shutdown(&self) {
        self.log(Level::Info, format_args!("shutting down logging"), None);
        self.slot.read().close();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Logger::default())
    }
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::default);

pub fn global() -> &'static Registry {
    &GLOBAL
}

pub fn initialize(options: InitOptions) -> Result<()> {
    global().initialize(options)
}

pub fn shutdown() {
    global().shutdown();
}

pub fn flush() {
    global().flush();
}

pub fn set_target(target: Target) -> Result<()> {
    global().set_target(target)
}

pub fn configure(options: LoggerOptions) -> Result<()> {
    global().configure(options)
}

pub fn set_level(level: Level) {
    global().set_level(level);
}

pub fn set_format(format: Format) {
    global().set_format(format);
}

pub fn current() -> Arc<Logger> {
    global().current()
}

#[track_caller]
pub fn log(level: Level, args: fmt::Arguments<'_>, fields: Option<Fields>) {
    global().log(level, args, fields);
}

#[doc(hidden)]
#[track_caller]
pub fn __log(level: Level, fields: Option<Fields>, args: fmt::Arguments<'_>) {
    global().log(level, args, fields);
}

#[doc(hidden)]
#[track_caller]
pub fn __fatal(fields: Option<Fields>, args: fmt::Arguments<'_>) -> ! {
    global().log(Level::Fatal, args, fields);
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LoggerConfig;
    use crate::sink::MemorySink;

    fn registry() -> (Registry, MemorySink) {
        let sink = MemorySink::new();
        let config = LoggerConfig {
            console: sink.clone().into(),
            show_caller: false,
            ..LoggerConfig::default()
        };
        (Registry::new(Logger::new(config)), sink)
    }

    #[test]
    fn test_replace_closes_previous() {
        let (registry, sink) = registry();
        let previous = registry.current();
        previous.enable_async(8, Duration::from_secs(60)).unwrap();
        previous.info(format_args!("queued"));

        let returned = registry.replace(Logger::default());
        assert!(Arc::ptr_eq(&previous, &returned));
        assert!(!returned.is_async());
        assert!(sink.contains("queued"));
    }

    #[test]
    fn test_set_target_keeps_settings() {
        let (registry, sink) = registry();
        registry.set_level(Level::Warning);
        registry.set_format(Format::Json);

        let dir = tempfile::tempdir().unwrap();
        registry.set_target(Target::file(dir.path().join("chat.log"))).unwrap();

        let config = registry.current().config();
        assert_eq!(config.level, Level::Warning);
        assert_eq!(config.format, Format::Json);
        assert!(!config.show_caller);

        registry.log(Level::Warning, format_args!("moved"), None);
        assert!(sink.contains("moved"));
    }

    #[test]
    fn test_shutdown_announces_itself() {
        let (registry, sink) = registry();
        registry.shutdown();
        assert!(sink.contains("[INFO]"));
        assert!(sink.contains("shutting down logging"));
    }
}
