use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LoggerError, Result};
use crate::format::{render, render_text, Format};
use crate::level::Level;
use crate::record::LogRecord;
use crate::rotation::{rotated_path, Clock, RotationPolicy};

/// Where records go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Console,
    /// Console plus a log file at the given base path.
    ConsoleAndFile(PathBuf),
}

impl Target {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Target::ConsoleAndFile(path.into())
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Target::Console => None,
            Target::ConsoleAndFile(path) => Some(path),
        }
    }
}

/// The console half of every target.
#[derive(Debug, Clone, Default)]
pub enum Console {
    #[default]
    Stdout,
    Stderr,
    Memory(MemorySink),
}

impl Console {
    fn write_line(&self, line: &str) {
        match self {
            Console::Stdout => {
                let _ = io::stdout().lock().write_all(line.as_bytes());
            }
            Console::Stderr => {
                let _ = io::stderr().lock().write_all(line.as_bytes());
            }
            Console::Memory(sink) => sink.push(line),
        }
    }

    fn flush(&self) {
        match self {
            Console::Stdout => {
                let _ = io::stdout().flush();
            }
            Console::Stderr => {
                let _ = io::stderr().flush();
            }
            Console::Memory(_) => {}
        }
    }
}

/// In-memory console, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer.lock().lines().map(str::to_string).collect()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.buffer.lock().contains(text)
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl From<MemorySink> for Console {
    fn from(sink: MemorySink) -> Self {
        Console::Memory(sink)
    }
}

/// Open file handle plus rotation metadata. Always accessed under the
/// logger's writer lock; `current_path` names the open file whenever there is one.
pub(crate) struct Writer {
    console: Console,
    file: Option<File>,
    base_path: Option<PathBuf>,
    current_path: Option<PathBuf>,
    rotation: RotationPolicy,
    clock: Arc<dyn Clock>,
    // set after the first failed file write, cleared when a file is opened
    write_failed: bool,
}

impl Writer {
    /// Build a writer for `target`. A file that cannot be opened leaves the
    /// writer console-only and the error is returned alongside it.
    pub(crate) fn open(
        console: Console,
        target: &Target,
        rotation: bool,
        clock: Arc<dyn Clock>,
    ) -> (Self, Result<()>) {
        let today = clock.today();
        let mut writer = Self {
            console,
            file: None,
            base_path: target.path().map(Path::to_path_buf),
            current_path: None,
            rotation: RotationPolicy::new(rotation, today),
            clock,
            write_failed: false,
        };
        let result = writer.open_current();
        (writer, result)
    }

    pub(crate) fn write(&mut self, record: &LogRecord, format: Format, show_caller: bool) {
        self.rotate_if_due();
        let mut line = render(record, format, show_caller);
        line.push('\n');

        self.console.write_line(&line);
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            if !self.write_failed {
                self.write_failed = true;
                let path = self
                    .current_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.warn(&format!("failed to write log file {path}: {e}"));
            }
        }
    }

    /// Returns true if a rotation was attempted.
    pub(crate) fn rotate_if_due(&mut self) -> bool {
        let today = self.clock.today();
        if self.base_path.is_none() || !self.rotation.is_due(today) {
            return false;
        }
        let _ = self.rotate();
        true
    }

    pub(crate) fn enable_rotation(&mut self) -> Result<()> {
        if self.rotation.is_enabled() {
            return Ok(());
        }
        self.rotation.set_enabled(true);
        if self.base_path.is_some() {
            self.rotate()
        } else {
            self.rotation.mark(self.clock.today());
            Ok(())
        }
    }

    pub(crate) fn disable_rotation(&mut self) {
        self.rotation.set_enabled(false);
    }

    pub(crate) fn retarget(&mut self, target: &Target) -> Result<()> {
        self.release_file();
        self.base_path = target.path().map(Path::to_path_buf);
        self.rotation.mark(self.clock.today());
        self.open_current()
    }

    pub(crate) fn flush(&mut self) {
        self.console.flush();
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Release the file for good; later writes go to the console only.
    pub(crate) fn close(&mut self) {
        self.flush();
        self.release_file();
        self.base_path = None;
    }

    pub(crate) fn console(&self) -> &Console {
        &self.console
    }

    pub(crate) fn target(&self) -> Target {
        match &self.base_path {
            Some(path) => Target::ConsoleAndFile(path.clone()),
            None => Target::Console,
        }
    }

    pub(crate) fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub(crate) fn rotation_enabled(&self) -> bool {
        self.rotation.is_enabled()
    }

    fn rotate(&mut self) -> Result<()> {
        self.release_file();
        self.rotation.mark(self.clock.today());
        self.open_current()
    }

    fn open_current(&mut self) -> Result<()> {
        let Some(base) = self.base_path.clone() else {
            return Ok(());
        };
        let path = if self.rotation.is_enabled() {
            rotated_path(&base, self.rotation.last_rotation())
        } else {
            base
        };

        match open_append(&path) {
            Ok(file) => {
                self.file = Some(file);
                self.current_path = Some(path);
                self.write_failed = false;
                Ok(())
            }
            Err(source) => {
                self.warn(&format!(
                    "failed to open log file {}: {}; logging to console only",
                    path.display(),
                    source
                ));
                Err(LoggerError::Open { path, source })
            }
        }
    }

    fn release_file(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
        self.current_path = None;
    }

    fn warn(&mut self, message: &str) {
        let record = LogRecord::new(Level::Warning, self.clock.now(), message);
        let mut line = render_text(&record, false);
        line.push('\n');
        self.console.write_line(&line);
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::ManualClock;
    use chrono::{Local, NaiveDate};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
    }

    #[test]
    fn test_memory_sink_is_shared_between_clones() {
        let sink = MemorySink::new();
        let console = Console::from(sink.clone());
        console.write_line("hello\n");
        assert_eq!(sink.lines(), vec!["hello".to_string()]);
        sink.clear();
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_writes_to_console_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/app.log");
        let sink = MemorySink::new();
        let (mut writer, result) = Writer::open(sink.clone().into(), &Target::file(&path), false, clock());
        assert!(result.is_ok());
        assert_eq!(writer.current_path(), Some(path.as_path()));

        let record = LogRecord::new(Level::Info, Local::now(), "hello");
        writer.write(&record, Format::Text, false);
        writer.flush();

        assert!(sink.contains("hello"));
        assert!(fs::read_to_string(&path).unwrap().contains("[INFO]"));
    }

    #[test]
    fn test_open_failure_degrades_to_console() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("app.log");

        let sink = MemorySink::new();
        let (mut writer, result) = Writer::open(sink.clone().into(), &Target::file(&path), false, clock());
        assert!(matches!(result, Err(LoggerError::Open { .. })));
        assert!(writer.current_path().is_none());
        assert!(sink.contains("[WARNING]"));

        writer.write(&LogRecord::new(Level::Error, Local::now(), "still here"), Format::Text, false);
        assert!(sink.contains("still here"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_failure_is_reported_once() {
        let sink = MemorySink::new();
        let (mut writer, result) =
            Writer::open(sink.clone().into(), &Target::file("/dev/full"), false, clock());
        assert!(result.is_ok());

        for message in ["first", "second"] {
            writer.write(&LogRecord::new(Level::Info, Local::now(), message), Format::Text, false);
        }

        let warnings: Vec<_> = sink
            .lines()
            .into_iter()
            .filter(|line| line.starts_with("[WARNING]"))
            .collect();
        assert_eq!(warnings.len(), 1, "got {warnings:?}");
        assert!(warnings[0].contains("failed to write log file /dev/full"));
        assert!(sink.contains("first") && sink.contains("second"));
    }

    #[test]
    fn test_close_stops_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sink = MemorySink::new();
        let (mut writer, _) = Writer::open(sink.clone().into(), &Target::file(&path), true, clock());
        writer.close();
        assert_eq!(writer.target(), Target::Console);

        writer.write(&LogRecord::new(Level::Info, Local::now(), "after close"), Format::Text, false);
        assert!(sink.contains("after close"));
        let dated = fs::read_to_string(dir.path().join("app.2024-01-01.log")).unwrap();
        assert!(!dated.contains("after close"));
    }
}
