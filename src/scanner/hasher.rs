//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] computes the BLAKE3 digest of a file by streaming it in fixed
//! size chunks, so memory stays bounded regardless of file size and no file
//! is ever hashed from a truncated read.
//!
//! [`fingerprint_all`] fans the work for a set of paths out over a dedicated
//! rayon pool. A failure on one path is recorded in the returned
//! [`FingerprintReport`] and never stops the other paths.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use super::HashError;
use crate::progress::ProgressCallback;
use crate::signal::CancelToken;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Read buffer size used when streaming file content.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
    cancel: Option<CancelToken>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: CHUNK_SIZE,
            cancel: None,
        }
    }

    /// Override the read chunk size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Abort in-flight hashing when the token trips.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Hash the entire content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, or if the
    /// cancel token trips mid-file.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            if self.is_cancelled() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path.to_path_buf(), e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

/// Convert a hash to lowercase hexadecimal.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse a 64-character hex string back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}

/// Digests computed for a set of paths, plus the paths that failed.
#[derive(Debug, Default)]
pub struct FingerprintReport {
    /// Successfully hashed paths
    pub digests: HashMap<PathBuf, Hash>,
    /// One error per path that could not be hashed
    pub failures: Vec<HashError>,
}

impl FingerprintReport {
    /// Number of paths hashed successfully.
    #[must_use]
    pub fn hashed(&self) -> usize {
        self.digests.len()
    }

    /// Digest for `path`, if it was hashed.
    #[must_use]
    pub fn digest(&self, path: &Path) -> Option<&Hash> {
        self.digests.get(path)
    }
}

/// Fingerprint every path on `pool`.
///
/// Each path is an independent unit: read failures are collected into
/// [`FingerprintReport::failures`] and the remaining paths still complete.
#[must_use]
pub fn fingerprint_all(
    pool: &rayon::ThreadPool,
    hasher: &Hasher,
    paths: &[PathBuf],
    progress: Option<&dyn ProgressCallback>,
) -> FingerprintReport {
    if paths.is_empty() {
        log::debug!("Fingerprint: no files to process");
        return FingerprintReport::default();
    }

    log::info!(
        "Fingerprinting {} files on {} threads",
        paths.len(),
        pool.current_num_threads()
    );
    if let Some(callback) = progress {
        callback.on_phase_start("fingerprint", paths.len());
    }

    let done = AtomicUsize::new(0);
    let results: Vec<(PathBuf, Result<Hash, HashError>)> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let result = hasher.full_hash(path);
                match &result {
                    Ok(_) => log::trace!("Hashed {}", path.display()),
                    Err(HashError::Interrupted(_)) => {}
                    Err(e) => log::warn!("Failed to hash {}: {}", path.display(), e),
                }
                if let Some(callback) = progress {
                    let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                    callback.on_progress(current, &path.to_string_lossy());
                }
                (path.clone(), result)
            })
            .collect()
    });

    let mut report = FingerprintReport::default();
    for (path, result) in results {
        match result {
            Ok(hash) => {
                report.digests.insert(path, hash);
            }
            Err(e) => report.failures.push(e),
        }
    }

    if let Some(callback) = progress {
        callback.on_phase_end("fingerprint");
    }
    log::info!(
        "Fingerprint complete: {} hashed, {} failed",
        report.hashed(),
        report.failures.len()
    );
    report
}
