use chatlog::{Level, Logger, Target};
use std::env;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

mod common;

const CHILD_ENV: &str = "CHATLOG_FATAL_CHILD_LOG";

/// Runs only inside the child process spawned by `test_fatal_exits_with_status_one`.
#[test]
fn fatal_child() {
    let Ok(path) = env::var(CHILD_ENV) else {
        return;
    };
    let (mut config, _sink) = common::memory_config(Level::Info);
    config.target = Target::file(PathBuf::from(path));
    let logger = Logger::new(config);
    logger.enable_async(64, Duration::from_secs(60)).unwrap();

    for i in 0..10 {
        logger.info(format_args!("queued {i}"));
    }
    logger.fatal(format_args!("x"));
}

#[test]
fn test_fatal_exits_with_status_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fatal.log");

    let status = Command::new(env::current_exe().unwrap())
        .args(["fatal_child", "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, &path)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));

    let contents = common::read(&path);
    let fatal: Vec<_> = contents
        .lines()
        .filter(|line| line.starts_with("[FATAL]"))
        .collect();
    assert_eq!(fatal.len(), 1);
    assert!(fatal[0].ends_with(" x"));

    // records queued before the fatal one are drained, not lost
    for i in 0..10 {
        assert!(contents.contains(&format!("queued {i}")), "missing queued {i}");
    }
}
