//! Per-file metadata extraction and the shared collector.
//!
//! [`inspect`] turns one path into a [`FileRecord`]. [`MetadataCollector`]
//! is the accumulator every walker task feeds: each folder batch is inspected
//! without holding the lock, then merged in a single critical section so
//! concurrent batches never interleave partial updates. A skipped path is
//! kept once per stage, however many walks trip over it.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{FailureStage, FileRecord, ScanError, SkippedPath};

/// Compression suffixes reported as an encoding rather than a type.
const ENCODING_SUFFIXES: &[(&str, &str)] = &[
    ("gz", "gzip"),
    ("bz2", "bzip2"),
    ("xz", "xz"),
    ("Z", "compress"),
    ("br", "br"),
];

/// Shorthand suffixes that stand for `.tar` plus an encoding.
const TAR_ALIASES: &[(&str, &str)] = &[("tgz", "gzip"), ("tbz2", "bzip2"), ("txz", "xz")];

/// Format a byte size with decimal thresholds.
///
/// `> 1_000_000` bytes prints as MB, `> 1_000` as KB, otherwise raw bytes.
///
/// ```
/// use dupscan::scanner::format_size;
///
/// assert_eq!(format_size(100), "100 bytes");
/// assert_eq!(format_size(50_000), "50.00 KB");
/// assert_eq!(format_size(2_500_000), "2.50 MB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes > 1_000_000 {
        format!("{:.2} MB", bytes as f64 / 1_000_000.0)
    } else if bytes > 1_000 {
        format!("{:.2} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Best-effort guess of `(mime_type, mime_encoding)` from a file name.
///
/// Either half may be unknown. A compression suffix becomes the encoding and
/// the type is guessed from what remains (`a.tar.gz` → tar, gzip).
#[must_use]
pub fn guess_type(path: &Path) -> (Option<String>, Option<String>) {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return (None, None);
    };

    let Some((stem, suffix)) = name.rsplit_once('.') else {
        return (guess_mime(&name), None);
    };

    if let Some((_, encoding)) = TAR_ALIASES
        .iter()
        .find(|(alias, _)| suffix.eq_ignore_ascii_case(alias))
    {
        return (Some("application/x-tar".to_string()), Some((*encoding).to_string()));
    }

    let encoding = ENCODING_SUFFIXES
        .iter()
        .find(|(ext, _)| *ext == suffix)
        .or_else(|| {
            ENCODING_SUFFIXES
                .iter()
                .find(|(ext, _)| *ext == suffix.to_lowercase())
        })
        .map(|(_, enc)| (*enc).to_string());

    match encoding {
        Some(enc) => (guess_mime(stem), Some(enc)),
        None => (guess_mime(&name), None),
    }
}

fn guess_mime(name: &str) -> Option<String> {
    mime_guess::from_path(name).first().map(|m| m.essence_str().to_string())
}

/// Inspect one path.
///
/// Returns `Ok(None)` for anything that is not a regular file (symlinks,
/// devices, sockets, directories); those are never considered.
///
/// # Errors
///
/// Returns [`ScanError`] if the path cannot be stat'ed.
pub fn inspect(path: &Path) -> Result<Option<FileRecord>, ScanError> {
    let metadata =
        std::fs::symlink_metadata(path).map_err(|e| ScanError::from_io(path.to_path_buf(), e))?;
    if !metadata.file_type().is_file() {
        log::trace!("Not a regular file, skipping: {}", path.display());
        return Ok(None);
    }

    let mut record = FileRecord::new(path.to_path_buf(), metadata.len());
    let (mime_type, mime_encoding) = guess_type(path);
    record.mime_type = mime_type;
    record.mime_encoding = mime_encoding;
    Ok(Some(record))
}

/// Result of merging one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records that were new to the collector
    pub added: usize,
    /// Records already known (first observation kept)
    pub already_known: usize,
    /// Paths that could not be inspected
    pub failed: usize,
}

#[derive(Debug, Default)]
struct CollectorState {
    records: BTreeMap<PathBuf, FileRecord>,
    skipped: Vec<SkippedPath>,
    skipped_keys: HashSet<(PathBuf, FailureStage)>,
}

impl CollectorState {
    fn push_skipped(&mut self, skipped: SkippedPath) {
        if self.skipped_keys.insert((skipped.path.clone(), skipped.stage)) {
            self.skipped.push(skipped);
        } else {
            log::trace!("Already skipped at {}: {}", skipped.stage, skipped.path.display());
        }
    }
}

/// Shared metadata accumulator for one scan.
///
/// Records are keyed by path in a `BTreeMap`, so iteration (and therefore
/// duplicate anchor order) is sorted and reproducible.
#[derive(Debug, Default)]
pub struct MetadataCollector {
    state: Mutex<CollectorState>,
}

impl MetadataCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inspect `paths` and merge them in one critical section.
    ///
    /// A path seen before keeps its first record; sizes are never refreshed.
    pub fn collect_batch(&self, paths: &[PathBuf]) -> BatchOutcome {
        let mut local = Vec::with_capacity(paths.len());
        let mut local_skipped = Vec::new();
        for path in paths {
            match inspect(path) {
                Ok(Some(record)) => local.push(record),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    local_skipped.push(e.into_skipped());
                }
            }
        }

        let mut outcome = BatchOutcome {
            failed: local_skipped.len(),
            ..BatchOutcome::default()
        };

        let mut state = self.lock();
        for record in local {
            if state.records.contains_key(&record.path) {
                outcome.already_known += 1;
            } else {
                state.records.insert(record.path.clone(), record);
                outcome.added += 1;
            }
        }
        for skipped in local_skipped {
            state.push_skipped(skipped);
        }
        outcome
    }

    /// Record a failure that happened outside [`collect_batch`](Self::collect_batch).
    ///
    /// A second failure for the same path and stage is dropped.
    pub fn record_skipped(&self, skipped: SkippedPath) {
        self.lock().push_skipped(skipped);
    }

    /// Number of distinct files collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every collected path.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().records.keys().cloned().collect()
    }

    /// Take the collected records and failures, leaving the collector empty.
    pub fn drain(&self) -> (BTreeMap<PathBuf, FileRecord>, Vec<SkippedPath>) {
        let mut state = self.lock();
        let records = std::mem::take(&mut state.records);
        let skipped = std::mem::take(&mut state.skipped);
        state.skipped_keys.clear();
        (records, skipped)
    }
}
