use chatlog::{Clock, Level, LoggerConfig, ManualClock, MemorySink};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Logger configuration that writes the console stream into memory.
#[allow(dead_code)]
pub fn memory_config(level: Level) -> (LoggerConfig, MemorySink) {
    let sink = MemorySink::new();
    let config = LoggerConfig {
        level,
        show_caller: false,
        console: sink.clone().into(),
        ..LoggerConfig::default()
    };
    (config, sink)
}

#[allow(dead_code)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A manual clock plus the same clock as a trait object, for handing to a logger.
#[allow(dead_code)]
pub fn manual_clock(year: i32, month: u32, day: u32) -> (Arc<ManualClock>, Arc<dyn Clock>) {
    let clock = Arc::new(ManualClock::on(date(year, month, day)));
    let shared: Arc<dyn Clock> = clock.clone();
    (clock, shared)
}

/// Contents of a log file, or an empty string if it does not exist.
#[allow(dead_code)]
pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// Poll `check` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}
