//! Scan orchestration.
//!
//! [`Engine::scan`] runs the stages in order:
//!
//! 1. **Concurrent pass**: the raw-tree walker and the archive expander run
//!    side by side, sharing the walk pool and the metadata collector.
//! 2. **Serial walk**: a single-threaded walk of the same tree, for the timing
//!    comparison only. Already-known files are not refreshed.
//! 3. **Fingerprint**: every discovered path is hashed on its own pool.
//! 4. **Classify**: anchor-based clustering over the completed metadata.
//! 5. **Assemble**: everything is packaged into one [`ScanResult`].
//!
//! Each stage starts only after the previous one has fully finished.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::classifier::{classify, Classification};
use super::result::{ScanResult, WalkDurations};
use crate::progress::ProgressCallback;
use crate::scanner::archive::DEFAULT_MAX_ARCHIVE_DEPTH;
use crate::scanner::{
    fingerprint_all, ArchiveExpander, FileRecord, FolderTimings, Hash, Hasher, MetadataCollector,
    ScanContext, TreeWalk, WalkConcurrent, WalkSerial,
};
use crate::signal::CancelToken;

/// Upper bound on the default walk pool size.
pub const MAX_WALK_THREADS: usize = 32;

/// Default walk pool size: twice the CPU count, capped at [`MAX_WALK_THREADS`].
#[must_use]
pub fn default_walk_threads() -> usize {
    (num_cpus::get() * 2).min(MAX_WALK_THREADS)
}

/// Default fingerprint pool size: the CPU count.
#[must_use]
pub fn default_hash_threads() -> usize {
    num_cpus::get()
}

/// Errors that stop a scan.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The root does not exist.
    #[error("Path not found: {0}")]
    RootNotFound(PathBuf),

    /// The root exists but is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Ctrl+C (or another holder of the token) stopped the scan.
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The per-run deadline passed.
    #[error("Scan timed out after {0:?}")]
    TimedOut(Duration),

    /// A worker pool could not be created.
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Walk pool size
    pub walk_threads: usize,
    /// Fingerprint pool size
    pub hash_threads: usize,
    /// Whether archives are extracted and scanned
    pub expand_archives: bool,
    /// Nesting limit for archives inside archives
    pub max_archive_depth: usize,
    /// Per-run deadline
    pub timeout: Option<Duration>,
    /// External shutdown flag (Ctrl+C)
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress reporting
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("walk_threads", &self.walk_threads)
            .field("hash_threads", &self.hash_threads)
            .field("expand_archives", &self.expand_archives)
            .field("max_archive_depth", &self.max_archive_depth)
            .field("timeout", &self.timeout)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            walk_threads: default_walk_threads(),
            hash_threads: default_hash_threads(),
            expand_archives: true,
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            timeout: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl EngineConfig {
    /// Set the walk pool size (minimum 1).
    #[must_use]
    pub fn with_walk_threads(mut self, threads: usize) -> Self {
        self.walk_threads = threads.max(1);
        self
    }

    /// Set the fingerprint pool size (minimum 1).
    #[must_use]
    pub fn with_hash_threads(mut self, threads: usize) -> Self {
        self.hash_threads = threads.max(1);
        self
    }

    /// Enable or disable archive expansion.
    #[must_use]
    pub fn with_expand_archives(mut self, enabled: bool) -> Self {
        self.expand_archives = enabled;
        self
    }

    /// Set the archive nesting limit.
    #[must_use]
    pub fn with_max_archive_depth(mut self, depth: usize) -> Self {
        self.max_archive_depth = depth;
        self
    }

    /// Stop the scan after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Duplicate detection engine.
///
/// # Example
///
/// ```no_run
/// use dupscan::duplicates::{Engine, EngineConfig};
/// use std::path::Path;
///
/// let engine = Engine::new(EngineConfig::default().with_walk_threads(8));
/// let result = engine.scan(Path::new("/data")).unwrap();
///
/// for row in result.exact_rows() {
///     println!("{} == {} (content match: {})", row.name1, row.name2, row.content_match);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Create an engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn cancel_token(&self) -> CancelToken {
        let token = match self.config.shutdown_flag {
            Some(ref flag) => CancelToken::from_flag(Arc::clone(flag)),
            None => CancelToken::new(),
        };
        match self.config.timeout {
            Some(timeout) => token.with_timeout(timeout),
            None => token,
        }
    }

    fn check_cancelled(&self, cancel: &CancelToken) -> Result<(), EngineError> {
        if !cancel.is_cancelled() {
            return Ok(());
        }
        match self.config.timeout {
            Some(timeout) if cancel.is_timed_out() => {
                log::warn!("Scan timed out after {:?}", timeout);
                Err(EngineError::TimedOut(timeout))
            }
            _ => {
                log::warn!("Scan interrupted");
                Err(EngineError::Interrupted)
            }
        }
    }

    fn progress(&self) -> Option<&dyn ProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    /// Scan `root` and classify everything found under it.
    ///
    /// Per-path failures never stop the scan; they are listed in
    /// [`ScanResult::failures`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the root is missing or not a directory, if a
    /// pool cannot be built, or if the scan is interrupted or times out.
    pub fn scan(&self, root: &Path) -> Result<ScanResult, EngineError> {
        if !root.exists() {
            return Err(EngineError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(EngineError::NotADirectory(root.to_path_buf()));
        }
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        log::info!("Scanning {}", root.display());
        let run_start = Instant::now();

        let cancel = self.cancel_token();
        let walk_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.walk_threads.max(1))
            .thread_name(|i| format!("dupscan-walk-{i}"))
            .build()?;
        let hash_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.hash_threads.max(1))
            .thread_name(|i| format!("dupscan-hash-{i}"))
            .build()?;

        let collector = Arc::new(MetadataCollector::new());
        let timings = Arc::new(FolderTimings::new());
        let mut ctx = ScanContext::new(Arc::clone(&collector))
            .with_timings(Arc::clone(&timings))
            .with_cancel_token(cancel.clone());
        if let Some(ref callback) = self.config.progress_callback {
            ctx = ctx.with_progress(Arc::clone(callback));
        }

        // Stage 1: raw-tree walk and archive expansion, side by side.
        let concurrent = WalkConcurrent::new(Arc::new(walk_pool));
        let expander = ArchiveExpander::new(self.config.max_archive_depth);
        if let Some(callback) = self.progress() {
            callback.on_phase_start("walk", 0);
        }
        let pass_start = Instant::now();
        let concurrent_walk = std::thread::scope(|s| {
            // jwalk must be driven from outside its pool, so each task gets a
            // plain scoped thread and the pool does the directory reads.
            let expansion = self
                .config
                .expand_archives
                .then(|| s.spawn(|| expander.expand_tree(&root, &concurrent, &ctx)));

            let walk_start = Instant::now();
            concurrent.walk(&root, &ctx);
            let walk_elapsed = walk_start.elapsed();

            if let Some(handle) = expansion {
                if let Err(panic) = handle.join() {
                    std::panic::resume_unwind(panic);
                }
            }
            walk_elapsed
        });
        let parallel_total = pass_start.elapsed();
        if let Some(callback) = self.progress() {
            callback.on_phase_end("walk");
        }
        self.check_cancelled(&cancel)?;

        // Stage 2: serial timing walk.
        if let Some(callback) = self.progress() {
            callback.on_phase_start("serial-walk", 0);
        }
        let serial_start = Instant::now();
        WalkSerial::new().walk(&root, &ctx);
        let serial_total = serial_start.elapsed();
        if let Some(callback) = self.progress() {
            callback.on_phase_end("serial-walk");
        }
        self.check_cancelled(&cancel)?;

        log::info!(
            "Walks complete: {} files, serial {:?}, concurrent {:?}",
            collector.len(),
            serial_total,
            concurrent_walk
        );

        // Stage 3: fingerprint.
        let paths = collector.paths();
        let hasher = Hasher::new().with_cancel_token(cancel.clone());
        let report = fingerprint_all(&hash_pool, &hasher, &paths, self.progress());
        self.check_cancelled(&cancel)?;
        for failure in report.failures {
            collector.record_skipped(failure.into_skipped());
        }

        // Stage 4: classify.
        let (records, failures) = collector.drain();
        let classification =
            hash_pool.install(|| classify(&records, &report.digests, self.progress()));
        let mixed_total = run_start.elapsed();

        // Stage 5: assemble.
        let result = ScanResult::assemble(
            root,
            records,
            &report.digests,
            classification,
            timings.snapshot(),
            WalkDurations {
                serial_total,
                parallel_total,
                concurrent_walk,
                mixed_total,
            },
            failures,
        );
        log::info!(
            "Scan complete: {} exact, {} fuzzy clusters, {} skipped paths",
            result.exact_clusters().len(),
            result.fuzzy_clusters().len(),
            result.failures().len()
        );
        Ok(result)
    }

    /// Run only the classifier over pre-collected records and digests.
    #[must_use]
    pub fn classify_only(
        &self,
        records: &BTreeMap<PathBuf, FileRecord>,
        digests: &HashMap<PathBuf, Hash>,
    ) -> Classification {
        classify(records, digests, self.progress())
    }
}
