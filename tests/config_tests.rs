//! Integration tests for the layered configuration.
//!
//! These tests cover defaults, TOML file parsing, environment variable
//! overrides, CLI flag overrides and recovery from invalid files.

use clap::Parser;
use dupscan::cli::{Cli, OutputFormat};
use dupscan::config::Config;
use dupscan::scanner::archive::DEFAULT_MAX_ARCHIVE_DEPTH;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

// =============================================================================
// Helper Functions
// =============================================================================

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all DUPSCAN_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DUPSCAN_") {
            std::env::remove_var(key);
        }
    }
}

fn lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// File and Environment Layers
// =============================================================================

#[test]
fn test_config_missing_file_gives_defaults() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();

    let config = Config::load_from_path(dir.path().join("absent.toml"));

    assert_eq!(config, Config::default());
    assert_eq!(config.max_archive_depth, DEFAULT_MAX_ARCHIVE_DEPTH);
    assert!(config.expand_archives);
    assert_eq!(config.task_timeout_secs, None);
}

#[test]
fn test_config_load_from_toml() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
walk_threads = 12
hash_threads = 3
max_archive_depth = 2
task_timeout_secs = 90
expand_archives = false
output = "json"
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path);

    assert_eq!(config.walk_threads, 12);
    assert_eq!(config.hash_threads, 3);
    assert_eq!(config.max_archive_depth, 2);
    assert_eq!(config.task_timeout_secs, Some(90));
    assert!(!config.expand_archives);
    assert_eq!(config.output, OutputFormat::Json);
}

#[test]
fn test_config_partial_toml_keeps_other_defaults() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "hash_threads = 5\n").unwrap();

    let config = Config::load_from_path(&path);

    assert_eq!(config.hash_threads, 5);
    assert_eq!(config.walk_threads, Config::default().walk_threads);
}

#[test]
fn test_env_overrides_file() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "walk_threads = 12\n").unwrap();

    std::env::set_var("DUPSCAN_WALK_THREADS", "7");
    std::env::set_var("DUPSCAN_EXPAND_ARCHIVES", "false");
    let config = Config::load_from_path(&path);
    clear_env();

    assert_eq!(config.walk_threads, 7);
    assert!(!config.expand_archives);
}

#[test]
fn test_invalid_toml_falls_back_to_defaults() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "walk_threads = \"many\"\n").unwrap();

    let config = Config::load_from_path(&path);

    assert_eq!(config, Config::default());
}

#[test]
fn test_unknown_keys_are_tolerated() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "walk_thread = 3\nhash_threads = 2\n").unwrap();

    let config = Config::load_from_path(&path);

    assert_eq!(config.hash_threads, 2);
    assert_eq!(config.walk_threads, Config::default().walk_threads);
}

// =============================================================================
// CLI Layer
// =============================================================================

#[test]
fn test_cli_overrides_everything() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "walk_threads = 12\noutput = \"json\"\n").unwrap();
    std::env::set_var("DUPSCAN_HASH_THREADS", "9");

    let cli = Cli::try_parse_from([
        "dupscan",
        "--config",
        path.to_str().unwrap(),
        "--walk-threads",
        "2",
        "--hash-threads",
        "1",
        "--output",
        "csv",
        "--no-archives",
        "--timeout",
        "30",
        "/data",
    ])
    .unwrap();
    let config = Config::load(&cli);
    clear_env();

    assert_eq!(config.walk_threads, 2);
    assert_eq!(config.hash_threads, 1);
    assert_eq!(config.output, OutputFormat::Csv);
    assert!(!config.expand_archives);
    assert_eq!(config.task_timeout_secs, Some(30));

    let engine = config.engine_config();
    assert_eq!(engine.timeout, Some(Duration::from_secs(30)));
    assert!(!engine.expand_archives);
}

#[test]
fn test_cli_without_flags_keeps_file_values() {
    let _lock = lock();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_archive_depth = 0\n").unwrap();

    let cli = Cli::try_parse_from(["dupscan", "--config", path.to_str().unwrap(), "/data"]).unwrap();
    let config = Config::load(&cli);

    assert_eq!(config.max_archive_depth, 0);
    assert!(config.expand_archives);
    assert_eq!(config.output, OutputFormat::Text);
}
