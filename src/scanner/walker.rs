//! Directory walkers: one concurrent, one strictly serial.
//!
//! # Overview
//!
//! Both strategies implement [`TreeWalk`] and feed the same
//! [`MetadataCollector`] one folder at a time through [`collect_folder`],
//! which times the collection of that folder's files into the walk's own
//! column of [`FolderTimings`]. The directory listing is outside the timed
//! span in both walks, so the two columns measure the same work. Running
//! both over the same root visits every file twice; that is the point, since
//! the two timing tables are compared afterwards.
//!
//! - [`WalkConcurrent`] uses [`jwalk`] on a shared rayon pool. Each folder's
//!   files are inspected from inside jwalk's per-directory callback, so
//!   folders are processed in parallel.
//! - [`WalkSerial`] uses [`walkdir`] on the calling thread, one folder after
//!   another in sorted order.
//!
//! Only regular files are considered. Symlinks are never followed.
//! Unreadable directories are recorded as skipped paths and the walk goes on.
//!
//! # Example
//!
//! ```no_run
//! use dupscan::scanner::{MetadataCollector, ScanContext, TreeWalk, WalkConcurrent};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let collector = Arc::new(MetadataCollector::new());
//! let ctx = ScanContext::new(collector.clone());
//! let walker = WalkConcurrent::with_threads(8).unwrap();
//! walker.walk(Path::new("/data"), &ctx);
//! println!("{} files", collector.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use jwalk::{Parallelism, WalkDir};
use serde::Serialize;

use super::metadata::{BatchOutcome, MetadataCollector};
use super::timing::FolderTimings;
use super::ScanError;
use crate::progress::ProgressCallback;
use crate::signal::CancelToken;

/// Which timing column a walk records into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStrategy {
    /// Single-threaded walk
    Serial,
    /// Parallel walk
    Concurrent,
}

impl std::fmt::Display for WalkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Shared accumulators and controls handed to every walk of one scan.
#[derive(Clone)]
pub struct ScanContext {
    /// Metadata sink
    pub collector: Arc<MetadataCollector>,
    /// Per-folder timing tables
    pub timings: Arc<FolderTimings>,
    /// Cooperative cancellation
    pub cancel: CancelToken,
    /// Optional progress reporting
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanContext")
            .field("collector", &self.collector)
            .field("timings", &self.timings)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl ScanContext {
    /// Context with fresh timing tables and no cancellation.
    #[must_use]
    pub fn new(collector: Arc<MetadataCollector>) -> Self {
        Self {
            collector,
            timings: Arc::new(FolderTimings::new()),
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Share timing tables with another context.
    #[must_use]
    pub fn with_timings(mut self, timings: Arc<FolderTimings>) -> Self {
        self.timings = timings;
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn record_error(&self, error: ScanError) {
        log::warn!("{}", error);
        self.collector.record_skipped(error.into_skipped());
    }
}

/// Collect one folder's files and add the time it took to `strategy`'s column.
pub fn collect_folder(
    collector: &MetadataCollector,
    timings: &FolderTimings,
    strategy: WalkStrategy,
    folder: &Path,
    batch: &[PathBuf],
) -> BatchOutcome {
    let start = Instant::now();
    let outcome = collector.collect_batch(batch);
    timings.record(strategy, folder, start.elapsed());
    outcome
}

/// Counters from one walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkOutcome {
    /// Folders whose files were handed to the collector
    pub folders_visited: usize,
    /// Regular files handed to the collector
    pub files_seen: usize,
    /// Directories or entries that could not be read
    pub errors: usize,
    /// Whether the walk stopped early on cancellation
    pub cancelled: bool,
}

/// A traversal strategy over a directory tree.
pub trait TreeWalk: Send + Sync {
    /// The timing column this walk records into.
    fn strategy(&self) -> WalkStrategy;

    /// Walk `root`, feeding every folder's regular files to `ctx.collector`.
    fn walk(&self, root: &Path, ctx: &ScanContext) -> WalkOutcome;
}

/// Parallel walk over a shared rayon pool, powered by jwalk.
#[derive(Debug, Clone)]
pub struct WalkConcurrent {
    pool: Arc<rayon::ThreadPool>,
}

impl WalkConcurrent {
    /// Walk on an existing pool.
    ///
    /// The pool should be dedicated to walking; the iterating thread must not
    /// be one of its workers.
    #[must_use]
    pub fn new(pool: Arc<rayon::ThreadPool>) -> Self {
        Self { pool }
    }

    /// Walk on a new pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns the rayon error if the pool cannot be created.
    pub fn with_threads(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("dupscan-walk-{i}"))
            .build()?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Number of walker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl TreeWalk for WalkConcurrent {
    fn strategy(&self) -> WalkStrategy {
        WalkStrategy::Concurrent
    }

    fn walk(&self, root: &Path, ctx: &ScanContext) -> WalkOutcome {
        let folders = Arc::new(AtomicUsize::new(0));
        let files = Arc::new(AtomicUsize::new(0));

        let collector = Arc::clone(&ctx.collector);
        let timings = Arc::clone(&ctx.timings);
        let cancel = ctx.cancel.clone();
        let progress = ctx.progress.clone();
        let folder_count = Arc::clone(&folders);
        let file_count = Arc::clone(&files);

        let walk_dir = WalkDir::new(root)
            .follow_links(false)
            .skip_hidden(false)
            .parallelism(Parallelism::RayonExistingPool {
                pool: Arc::clone(&self.pool),
                busy_timeout: None,
            })
            .process_read_dir(move |_depth, path, _read_dir_state, children| {
                if cancel.is_cancelled() {
                    // Dropping the children stops jwalk from descending further.
                    children.clear();
                    return;
                }

                let batch: Vec<PathBuf> = children
                    .iter()
                    .filter_map(|c| c.as_ref().ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.path())
                    .collect();
                collect_folder(&collector, &timings, WalkStrategy::Concurrent, path, &batch);

                let seen = file_count.fetch_add(batch.len(), Ordering::Relaxed) + batch.len();
                folder_count.fetch_add(1, Ordering::Relaxed);
                if let Some(ref callback) = progress {
                    callback.on_progress(seen, &path.to_string_lossy());
                }
            });

        let mut errors = 0;
        for entry in walk_dir {
            match entry {
                Ok(entry) => {
                    if let Some(ref e) = entry.read_children_error {
                        errors += 1;
                        ctx.record_error(jwalk_error(entry.path(), e));
                    }
                }
                Err(e) => {
                    errors += 1;
                    let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    ctx.record_error(jwalk_error(path, &e));
                }
            }
        }

        let outcome = WalkOutcome {
            folders_visited: folders.load(Ordering::Relaxed),
            files_seen: files.load(Ordering::Relaxed),
            errors,
            cancelled: ctx.cancel.is_cancelled(),
        };
        log::debug!("Concurrent walk of {}: {:?}", root.display(), outcome);
        outcome
    }
}

fn jwalk_error(path: PathBuf, error: &jwalk::Error) -> ScanError {
    let kind = error
        .io_error()
        .map_or(std::io::ErrorKind::Other, std::io::Error::kind);
    ScanError::from_io(path, std::io::Error::new(kind, error.to_string()))
}

/// Strictly sequential walk on the calling thread, powered by walkdir.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkSerial;

impl WalkSerial {
    /// Create a serial walker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TreeWalk for WalkSerial {
    fn strategy(&self) -> WalkStrategy {
        WalkStrategy::Serial
    }

    fn walk(&self, root: &Path, ctx: &ScanContext) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();
        let mut pending = vec![root.to_path_buf()];

        while let Some(folder) = pending.pop() {
            if ctx.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let mut batch = Vec::new();
            let mut subfolders = Vec::new();
            let listing = walkdir::WalkDir::new(&folder)
                .follow_links(false)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();

            for entry in listing {
                match entry {
                    Ok(entry) => {
                        let file_type = entry.file_type();
                        if file_type.is_dir() {
                            subfolders.push(entry.into_path());
                        } else if file_type.is_file() {
                            batch.push(entry.into_path());
                        }
                    }
                    Err(e) => {
                        outcome.errors += 1;
                        let path = e.path().map_or_else(|| folder.clone(), Path::to_path_buf);
                        let kind = e
                            .io_error()
                            .map_or(std::io::ErrorKind::Other, std::io::Error::kind);
                        ctx.record_error(ScanError::from_io(
                            path,
                            std::io::Error::new(kind, e.to_string()),
                        ));
                    }
                }
            }

            collect_folder(&ctx.collector, &ctx.timings, WalkStrategy::Serial, &folder, &batch);

            outcome.folders_visited += 1;
            outcome.files_seen += batch.len();
            if let Some(ref callback) = ctx.progress {
                callback.on_progress(outcome.files_seen, &folder.to_string_lossy());
            }

            // Reverse so the stack pops subfolders in sorted order.
            pending.extend(subfolders.into_iter().rev());
        }

        log::debug!("Serial walk of {}: {:?}", root.display(), outcome);
        outcome
    }
}
