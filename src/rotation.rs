//! Calendar-day rotation.
//!
//! Rotation is due whenever today's local date differs from the date of the
//! last rotation. It is checked lazily by the write path and by the async
//! worker's periodic tick; nothing fires at midnight.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Source of the current local time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Noon (local time) on the given date.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(noon(date))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(noon(date));
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

fn noon(date: NaiveDate) -> DateTime<Local> {
    let naive = date
        .and_hms_opt(12, 0, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN));
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    enabled: bool,
    last_rotation: NaiveDate,
}

impl RotationPolicy {
    pub fn new(enabled: bool, today: NaiveDate) -> Self {
        Self {
            enabled,
            last_rotation: today,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn last_rotation(&self) -> NaiveDate {
        self.last_rotation
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.enabled && today != self.last_rotation
    }

    pub fn mark(&mut self, today: NaiveDate) {
        self.last_rotation = today;
    }
}

/// `logs/app.log` on 2024-01-02 becomes `logs/app.2024-01-02.log`.
pub fn rotated_path(base: &Path, date: NaiveDate) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}.{}.{}", stem, date.format("%Y-%m-%d"), ext.to_string_lossy()),
        None => format!("{}.{}", stem, date.format("%Y-%m-%d")),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rotated_path_inserts_date_before_extension() {
        assert_eq!(
            rotated_path(Path::new("logs/app.log"), date(2024, 1, 2)),
            PathBuf::from("logs/app.2024-01-02.log")
        );
        assert_eq!(
            rotated_path(Path::new("app"), date(2024, 1, 2)),
            PathBuf::from("app.2024-01-02")
        );
    }

    #[test]
    fn test_due_only_when_enabled_and_date_changed() {
        let mut policy = RotationPolicy::new(false, date(2024, 1, 1));
        assert!(!policy.is_due(date(2024, 1, 2)));

        policy.set_enabled(true);
        assert!(!policy.is_due(date(2024, 1, 1)));
        assert!(policy.is_due(date(2024, 1, 2)));

        policy.mark(date(2024, 1, 2));
        assert!(!policy.is_due(date(2024, 1, 2)));
    }

    #[test]
    fn test_same_day_different_month_or_year_is_due() {
        let policy = RotationPolicy::new(true, date(2024, 1, 1));
        assert!(policy.is_due(date(2024, 2, 1)));
        assert!(policy.is_due(date(2025, 1, 1)));
    }

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::on(date(2024, 1, 1));
        assert_eq!(clock.today(), date(2024, 1, 1));
        clock.advance(chrono::Duration::days(1));
        assert_eq!(clock.today(), date(2024, 1, 2));
        clock.set_date(date(2030, 6, 15));
        assert_eq!(clock.today(), date(2030, 6, 15));
    }
}
