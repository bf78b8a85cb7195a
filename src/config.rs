//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. Environment variables prefixed with `DUPSCAN_` (e.g. `DUPSCAN_WALK_THREADS=8`)
//! 4. Command-line flags
//!
//! A file that fails to parse is reported and ignored. Unknown keys are
//! reported with the closest known key as a suggestion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, OutputFormat};
use crate::duplicates::{default_hash_threads, default_walk_threads, EngineConfig};
use crate::scanner::archive::DEFAULT_MAX_ARCHIVE_DEPTH;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPSCAN_";

const KNOWN_KEYS: &[&str] = &[
    "walk_threads",
    "hash_threads",
    "max_archive_depth",
    "task_timeout_secs",
    "expand_archives",
    "output",
];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory walker threads.
    pub walk_threads: usize,
    /// Fingerprinting threads.
    pub hash_threads: usize,
    /// Nesting limit for archives inside archives.
    pub max_archive_depth: usize,
    /// Per-run deadline in seconds; no deadline when absent.
    pub task_timeout_secs: Option<u64>,
    /// Whether archives are extracted and scanned.
    pub expand_archives: bool,
    /// Report format.
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            walk_threads: default_walk_threads(),
            hash_threads: default_hash_threads(),
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            task_timeout_secs: None,
            expand_archives: true,
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Load defaults, the configuration file and the environment, then apply
    /// the command-line flags in `cli`.
    #[must_use]
    pub fn load(cli: &Cli) -> Self {
        let path = cli.config.clone().or_else(Self::config_path);
        let mut config = match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load_without_file(),
        };
        config.merge_cli(cli);
        config
    }

    /// Load defaults, `path` (if it exists) and the environment.
    ///
    /// Falls back to defaults if the merged configuration is invalid.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.exists() {
            log::debug!("Loading configuration from {}", path.display());
            warn_unknown_keys(path);
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    fn load_without_file() -> Self {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX)))
    }

    fn extract(figment: Figment) -> Self {
        match figment.extract() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Apply command-line overrides.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(threads) = cli.walk_threads {
            self.walk_threads = threads;
        }
        if let Some(threads) = cli.hash_threads {
            self.hash_threads = threads;
        }
        if let Some(depth) = cli.max_archive_depth {
            self.max_archive_depth = depth;
        }
        if let Some(secs) = cli.timeout {
            self.task_timeout_secs = Some(secs);
        }
        if cli.no_archives {
            self.expand_archives = false;
        }
        if let Some(output) = cli.output {
            self.output = output;
        }
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default()
            .with_walk_threads(self.walk_threads)
            .with_hash_threads(self.hash_threads)
            .with_max_archive_depth(self.max_archive_depth)
            .with_expand_archives(self.expand_archives);
        if let Some(secs) = self.task_timeout_secs {
            engine = engine.with_timeout(Duration::from_secs(secs));
        }
        engine
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "dupscan", "dupscan")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Closest known key to `key`, if any is reasonably close.
#[must_use]
pub fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(key, known)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}

fn warn_unknown_keys(path: &Path) {
    let table: BTreeMap<String, figment::value::Value> =
        match Figment::from(Toml::file(path)).extract() {
            Ok(table) => table,
            Err(_) => return,
        };
    for key in table.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        match suggest_key(key) {
            Some(suggestion) => log::warn!(
                "Unknown configuration key '{}' in {} (did you mean '{}'?)",
                key,
                path.display(),
                suggestion
            ),
            None => log::warn!("Unknown configuration key '{}' in {}", key, path.display()),
        }
    }
}
