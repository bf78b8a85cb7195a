//! Per-folder wall-clock timing for the serial and concurrent walks.
//!
//! Timings are keyed by the *leaf* folder name, not the full path. Two
//! different folders that share a name (`a/src` and `b/src`) accumulate into
//! the same entry. This is an accepted approximation of the comparison
//! table, not something callers should rely on for per-path accounting.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use super::walker::WalkStrategy;

/// Serial vs. parallel elapsed time for one folder name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderTiming {
    /// Leaf folder name
    pub folder_name: String,
    /// Seconds spent in this folder by the serial walk
    pub serial_elapsed_secs: f64,
    /// Seconds spent in this folder by the concurrent walk
    pub parallel_elapsed_secs: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    serial: Duration,
    parallel: Duration,
}

/// Shared timing tables for both walk strategies.
#[derive(Debug, Default)]
pub struct FolderTimings {
    slots: Mutex<HashMap<String, Slot>>,
}

impl FolderTimings {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `elapsed` to the entry for `folder`'s leaf name.
    pub fn record(&self, strategy: WalkStrategy, folder: &Path, elapsed: Duration) {
        let key = leaf_name(folder);
        let mut slots = self.lock();
        let slot = slots.entry(key).or_default();
        match strategy {
            WalkStrategy::Serial => slot.serial += elapsed,
            WalkStrategy::Concurrent => slot.parallel += elapsed,
        }
    }

    /// Total time recorded by one strategy.
    #[must_use]
    pub fn total(&self, strategy: WalkStrategy) -> Duration {
        let slots = self.lock();
        slots
            .values()
            .map(|s| match strategy {
                WalkStrategy::Serial => s.serial,
                WalkStrategy::Concurrent => s.parallel,
            })
            .sum()
    }

    /// Snapshot of every entry, sorted by folder name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FolderTiming> {
        let slots = self.lock();
        let mut rows: Vec<FolderTiming> = slots
            .iter()
            .map(|(name, slot)| FolderTiming {
                folder_name: name.clone(),
                serial_elapsed_secs: slot.serial.as_secs_f64(),
                parallel_elapsed_secs: slot.parallel.as_secs_f64(),
            })
            .collect();
        rows.sort_by(|a, b| a.folder_name.cmp(&b.folder_name));
        rows
    }
}

/// Leaf name used as the timing key; the full path when there is none (`/`).
#[must_use]
pub fn leaf_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_by_leaf_name() {
        let timings = FolderTimings::new();
        timings.record(
            WalkStrategy::Concurrent,
            Path::new("/a/src"),
            Duration::from_millis(10),
        );
        timings.record(
            WalkStrategy::Concurrent,
            Path::new("/b/src"),
            Duration::from_millis(5),
        );
        timings.record(WalkStrategy::Serial, Path::new("/a/src"), Duration::from_millis(30));

        let rows = timings.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].folder_name, "src");
        assert!((rows[0].parallel_elapsed_secs - 0.015).abs() < 1e-9);
        assert!((rows[0].serial_elapsed_secs - 0.030).abs() < 1e-9);
    }

    #[test]
    fn test_totals_per_strategy() {
        let timings = FolderTimings::new();
        timings.record(WalkStrategy::Serial, Path::new("/x"), Duration::from_millis(4));
        timings.record(WalkStrategy::Serial, Path::new("/y"), Duration::from_millis(6));

        assert_eq!(timings.total(WalkStrategy::Serial), Duration::from_millis(10));
        assert_eq!(timings.total(WalkStrategy::Concurrent), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_sorted() {
        let timings = FolderTimings::new();
        for name in ["zeta", "alpha", "mid"] {
            timings.record(WalkStrategy::Serial, Path::new(name), Duration::ZERO);
        }
        let names: Vec<_> = timings.snapshot().into_iter().map(|r| r.folder_name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_leaf_name_of_root() {
        assert_eq!(leaf_name(Path::new("/")), "/");
        assert_eq!(leaf_name(Path::new("/tmp/data")), "data");
    }
}
