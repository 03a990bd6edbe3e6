use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::AsyncDispatcher;
use crate::error::{LoggerError, Result};
use crate::format::Format;
use crate::level::Level;
use crate::record::{caller_site, Fields, LogRecord};
use crate::rotation::{Clock, SystemClock};
use crate::sink::{Console, Target, Writer};

pub const DEFAULT_BUFFER_SIZE: usize = 1000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Queue capacity and tick interval for asynchronous delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncConfig {
    pub buffer_size: usize,
    pub flush_interval: Duration,
}

impl AsyncConfig {
    /// Zero values fall back to the defaults.
    pub fn new(buffer_size: usize, flush_interval: Duration) -> Self {
        Self {
            buffer_size: if buffer_size == 0 {
                DEFAULT_BUFFER_SIZE
            } else {
                buffer_size
            },
            flush_interval: if flush_interval.is_zero() {
                DEFAULT_FLUSH_INTERVAL
            } else {
                flush_interval
            },
        }
    }
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL)
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: Level,
    pub format: Format,
    pub show_caller: bool,
    pub target: Target,
    pub console: Console,
    pub rotation: bool,
    /// `None` means records are written synchronously.
    pub async_delivery: Option<AsyncConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Text,
            show_caller: true,
            target: Target::Console,
            console: Console::Stdout,
            rotation: false,
            async_delivery: None,
        }
    }
}

/// A partial reconfiguration; unset options are left as they are.
#[derive(Debug, Clone, Default)]
pub struct LoggerOptions {
    pub level: Option<Level>,
    pub format: Option<Format>,
    pub show_caller: Option<bool>,
    pub target: Option<Target>,
    pub rotation: Option<bool>,
    pub async_delivery: Option<Option<AsyncConfig>>,
}

impl LoggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn show_caller(mut self, show_caller: bool) -> Self {
        self.show_caller = Some(show_caller);
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn rotation(mut self, enabled: bool) -> Self {
        self.rotation = Some(enabled);
        self
    }

    pub fn enable_async(mut self, buffer_size: usize, flush_interval: Duration) -> Self {
        self.async_delivery = Some(Some(AsyncConfig::new(buffer_size, flush_interval)));
        self
    }

    pub fn disable_async(mut self) -> Self {
        self.async_delivery = Some(None);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    format: Format,
    show_caller: bool,
}

/// State shared between the logger and its writer thread.
pub(crate) struct Shared {
    level: AtomicU8,
    settings: RwLock<Settings>,
    writer: Mutex<Writer>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    pub(crate) fn open(config: &LoggerConfig, clock: Arc<dyn Clock>) -> (Self, Result<()>) {
        let (writer, result) = Writer::open(
            config.console.clone(),
            &config.target,
            config.rotation,
            Arc::clone(&clock),
        );
        let shared = Self {
            level: AtomicU8::new(config.level.as_u8()),
            settings: RwLock::new(Settings {
                format: config.format,
                show_caller: config.show_caller,
            }),
            writer: Mutex::new(writer),
            clock,
        };
        (shared, result)
    }

    fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    pub(crate) fn write(&self, record: &LogRecord) {
        let settings = *self.settings.read();
        self.writer
            .lock()
            .write(record, settings.format, settings.show_caller);
    }

    pub(crate) fn check_rotation(&self) {
        self.writer.lock().rotate_if_due();
    }

    pub(crate) fn flush_streams(&self) {
        self.writer.lock().flush();
    }
}

/// A configurable logging unit: threshold, format, target, rotation and
/// optional background delivery.
pub struct Logger {
    shared: Arc<Shared>,
    dispatcher: RwLock<Option<AsyncDispatcher>>,
}

impl Logger {
    /// Build a logger. A target file that cannot be opened leaves it console-only.
    pub fn new(config: LoggerConfig) -> Self {
        Self::open(config).0
    }

    pub fn with_clock(config: LoggerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::open_with_clock(config, clock).0
    }

    /// Like [`Logger::new`], but also reports whether the target and the
    /// writer thread came up. The logger is usable either way.
    pub fn open(config: LoggerConfig) -> (Self, Result<()>) {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: LoggerConfig, clock: Arc<dyn Clock>) -> (Self, Result<()>) {
        let (shared, mut result) = Shared::open(&config, clock);
        let logger = Self {
            shared: Arc::new(shared),
            dispatcher: RwLock::new(None),
        };
        if let Some(async_config) = config.async_delivery {
            let started =
                logger.enable_async(async_config.buffer_size, async_config.flush_interval);
            result = result.and(started);
        }
        (logger, result)
    }

    pub fn level(&self) -> Level {
        self.shared.level()
    }

    pub fn set_level(&self, level: Level) {
        self.shared.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    pub fn format(&self) -> Format {
        self.shared.settings.read().format
    }

    pub fn set_format(&self, format: Format) {
        self.shared.settings.write().format = format;
    }

    pub fn show_caller(&self) -> bool {
        self.shared.settings.read().show_caller
    }

    pub fn set_show_caller(&self, show_caller: bool) {
        self.shared.settings.write().show_caller = show_caller;
    }

    /// Switch an open file to today's date-stamped name and rotate daily from now on.
    pub fn enable_rotation(&self) -> Result<()> {
        self.shared.writer.lock().enable_rotation()
    }

    pub fn disable_rotation(&self) {
        self.shared.writer.lock().disable_rotation();
    }

    pub fn rotation_enabled(&self) -> bool {
        self.shared.writer.lock().rotation_enabled()
    }

    /// Start background delivery. No-op if it is already running.
    pub fn enable_async(&self, buffer_size: usize, flush_interval: Duration) -> Result<()> {
        let mut slot = self.dispatcher.write();
        if slot.is_some() {
            return Ok(());
        }
        let config = AsyncConfig::new(buffer_size, flush_interval);
        let dispatcher = AsyncDispatcher::spawn(
            Arc::clone(&self.shared),
            config.buffer_size,
            config.flush_interval,
        )
        .map_err(LoggerError::Worker)?;
        *slot = Some(dispatcher);
        Ok(())
    }

    /// Stop background delivery, blocking until the queue has been drained.
    ///
    /// The dispatcher stays installed while the worker drains, so records
    /// emitted meanwhile still queue behind the pending ones. Whatever lands
    /// in the queue after the worker exits is written here, in order.
    pub fn disable_async(&self) {
        if let Some(dispatcher) = self.dispatcher.read().as_ref() {
            dispatcher.shutdown();
        }
        let mut slot = self.dispatcher.write();
        if let Some(dispatcher) = slot.take() {
            dispatcher.shutdown();
            dispatcher.write_leftovers(&self.shared);
        }
    }

    pub fn async_config(&self) -> Option<AsyncConfig> {
        self.dispatcher
            .read()
            .as_ref()
            .map(|d| AsyncConfig::new(d.capacity(), d.flush_interval()))
    }

    pub fn is_async(&self) -> bool {
        self.dispatcher.read().is_some()
    }

    /// Point this logger at a new target in place, draining queued records
    /// into the old one first. Background delivery, if active, resumes with
    /// the same capacity and interval.
    ///
    /// For the logger held by a [`Registry`](crate::Registry), go through
    /// [`Registry::set_target`](crate::Registry::set_target), which replaces
    /// the instance so emitters never see it mid-move.
    pub fn set_target(&self, target: Target) -> Result<()> {
        let mut slot = self.dispatcher.write();
        let resume = slot
            .as_ref()
            .map(|d| AsyncConfig::new(d.capacity(), d.flush_interval()));
        if let Some(dispatcher) = slot.take() {
            dispatcher.shutdown();
            dispatcher.write_leftovers(&self.shared);
        }

        let result = self.shared.writer.lock().retarget(&target);

        if let Some(config) = resume {
            let dispatcher = AsyncDispatcher::spawn(
                Arc::clone(&self.shared),
                config.buffer_size,
                config.flush_interval,
            )
            .map_err(LoggerError::Worker)?;
            *slot = Some(dispatcher);
        }
        result
    }

    pub fn target(&self) -> Target {
        self.shared.writer.lock().target()
    }

    /// The file currently being written, including any date stamp.
    pub fn current_file(&self) -> Option<PathBuf> {
        self.shared
            .writer
            .lock()
            .current_path()
            .map(Path::to_path_buf)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> LoggerConfig {
        let settings = *self.shared.settings.read();
        let async_delivery = self.async_config();
        let writer = self.shared.writer.lock();
        LoggerConfig {
            level: self.level(),
            format: settings.format,
            show_caller: settings.show_caller,
            target: writer.target(),
            console: writer.console().clone(),
            rotation: writer.rotation_enabled(),
            async_delivery,
        }
    }

    /// Apply every option that is set. All options are attempted; the first
    /// error is returned.
    pub fn configure(&self, options: LoggerOptions) -> Result<()> {
        let mut result = Ok(());

        if let Some(level) = options.level {
            self.set_level(level);
        }
        if let Some(format) = options.format {
            self.set_format(format);
        }
        if let Some(show_caller) = options.show_caller {
            self.set_show_caller(show_caller);
        }
        match options.rotation {
            Some(true) => result = result.and(self.enable_rotation()),
            Some(false) => self.disable_rotation(),
            None => {}
        }
        if let Some(target) = options.target {
            result = result.and(self.set_target(target));
        }
        match options.async_delivery {
            Some(Some(config)) => {
                result = result.and(self.enable_async(config.buffer_size, config.flush_interval))
            }
            Some(None) => self.disable_async(),
            None => {}
        }
        result
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.shared.clock)
    }

    /// Emit a record. Below the threshold this does nothing.
    #[track_caller]
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>, fields: Option<Fields>) {
        if !self.enabled(level) {
            return;
        }
        let location = Location::caller();
        let caller = self.show_caller().then(|| caller_site(location));
        self.log_message(level, fmt::format(args), caller, fields);
    }

    /// Emit an already-rendered message with an explicit call site.
    pub fn log_message(
        &self,
        level: Level,
        message: String,
        caller: Option<String>,
        fields: Option<Fields>,
    ) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord::new(level, self.shared.clock.now(), message)
            .with_caller(caller)
            .with_fields(fields);
        self.deliver(record);
    }

    fn deliver(&self, record: LogRecord) {
        if record.level == Level::Fatal {
            self.shared.write(&record);
            self.disable_async();
            self.shared.flush_streams();
            process::exit(1);
        }

        let slot = self.dispatcher.read();
        let record = match slot.as_ref() {
            Some(dispatcher) => match dispatcher.try_dispatch(record) {
                Ok(()) => return,
                Err(record) => record,
            },
            None => record,
        };
        self.shared.write(&record);
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args, None);
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args, None);
    }

    #[track_caller]
    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warning, args, None);
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args, None);
    }

    /// Write the record synchronously, drain pending records and exit with status 1.
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) -> ! {
        self.log(Level::Fatal, args, None);
        process::exit(1)
    }

    /// Best-effort durability request. With background delivery this waits
    /// for the queue to drain, unless the queue is full.
    pub fn flush(&self) {
        let slot = self.dispatcher.read();
        match slot.as_ref() {
            Some(dispatcher) => {
                dispatcher.flush();
            }
            None => self.shared.flush_streams(),
        }
    }

    /// Drain background delivery and release the file. Later records go to
    /// the console only.
    pub fn close(&self) {
        self.disable_async();
        self.shared.writer.lock().close();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}
