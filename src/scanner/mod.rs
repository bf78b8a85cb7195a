//! Scanner module for directory traversal, archive expansion and fingerprinting.
//!
//! This module provides functionality for:
//! - Concurrent directory walking using jwalk, and a serial walk using walkdir
//! - Transparent expansion of zip/tar/gzip archives into sibling folders
//! - Per-file metadata extraction (extension, size, guessed MIME type)
//! - Content fingerprinting with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: The [`TreeWalk`] trait and its two strategies
//! - [`archive`]: Archive detection and extraction
//! - [`metadata`]: The shared [`MetadataCollector`]
//! - [`hasher`]: BLAKE3 file hashing (streaming) and the fingerprint pool
//! - [`timing`]: Per-folder timing tables
//!
//! # Example
//!
//! ```no_run
//! use dupscan::scanner::{MetadataCollector, ScanContext, TreeWalk, WalkSerial};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let ctx = ScanContext::new(Arc::new(MetadataCollector::new()));
//! let outcome = WalkSerial::new().walk(Path::new("."), &ctx);
//! println!("visited {} folders", outcome.folders_visited);
//! ```

pub mod archive;
pub mod hasher;
pub mod metadata;
pub mod timing;
pub mod walker;

use std::path::PathBuf;

use serde::Serialize;

// Re-export main types
pub use archive::{
    extract_archive, extract_archive_cancellable, extraction_folder, is_archive, ArchiveExpander,
};
pub use hasher::{fingerprint_all, hash_to_hex, hex_to_hash, FingerprintReport, Hash, Hasher};
pub use metadata::{format_size, inspect, BatchOutcome, MetadataCollector};
pub use timing::{FolderTiming, FolderTimings};
pub use walker::{
    collect_folder, ScanContext, TreeWalk, WalkConcurrent, WalkOutcome, WalkSerial, WalkStrategy,
};

/// Metadata for a discovered file.
///
/// Created the first time a path is observed during traversal. The
/// `content_digest` is attached after fingerprinting; `size_bytes` is never
/// refreshed after the first observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// Lowercased extension without the leading dot (empty if none)
    pub extension: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Guessed MIME type, if any
    pub mime_type: Option<String>,
    /// Guessed transfer encoding (e.g. `gzip`), if any
    pub mime_encoding: Option<String>,
    /// Hex BLAKE3 digest of the full content
    pub content_digest: Option<String>,
}

impl FileRecord {
    /// Create a record with only path and size known.
    #[must_use]
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            path,
            name,
            extension,
            size_bytes,
            mime_type: None,
            mime_encoding: None,
            content_digest: None,
        }
    }
}

/// Pipeline stage at which a path was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Directory listing or file stat failed
    Traversal,
    /// Archive could not be extracted
    Extraction,
    /// File could not be read for hashing
    Fingerprint,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traversal => write!(f, "traversal"),
            Self::Extraction => write!(f, "extraction"),
            Self::Fingerprint => write!(f, "fingerprint"),
        }
    }
}

/// A path that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPath {
    /// The path that failed
    pub path: PathBuf,
    /// Stage at which it failed
    pub stage: FailureStage,
    /// Human-readable reason
    pub reason: String,
}

impl SkippedPath {
    /// Create a new skipped-path entry.
    #[must_use]
    pub fn new(path: PathBuf, stage: FailureStage, reason: impl Into<String>) -> Self {
        Self {
            path,
            stage,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }

    /// The path this error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) => p,
            Self::Io { path, .. } => path,
        }
    }

    /// Convert into a [`SkippedPath`] at the traversal stage.
    #[must_use]
    pub fn into_skipped(self) -> SkippedPath {
        let path = self.path().to_path_buf();
        SkippedPath::new(path, FailureStage::Traversal, self.to_string())
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing was abandoned because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }

    /// The path this error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }

    /// Convert into a [`SkippedPath`] at the fingerprint stage.
    #[must_use]
    pub fn into_skipped(self) -> SkippedPath {
        let path = self.path().to_path_buf();
        SkippedPath::new(path, FailureStage::Fingerprint, self.to_string())
    }
}

/// Errors that can occur while extracting an archive.
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    /// The suffix is recognized but no extractor exists for it.
    #[error("Unsupported archive format: {0}")]
    Unsupported(PathBuf),

    /// The archive could not be parsed.
    #[error("Corrupt archive {path}: {reason}")]
    Corrupt {
        /// Archive path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// An I/O error occurred while reading the archive or writing its contents.
    #[error("I/O error extracting {path}: {source}")]
    Io {
        /// Archive path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Extraction stopped because cancellation was requested.
    #[error("Extraction interrupted: {0}")]
    Interrupted(PathBuf),
}

impl ExtractionError {
    /// Convert into a [`SkippedPath`] at the extraction stage.
    #[must_use]
    pub fn into_skipped(self) -> SkippedPath {
        let path = match &self {
            Self::Unsupported(p) | Self::Interrupted(p) => p.clone(),
            Self::Corrupt { path, .. } | Self::Io { path, .. } => path.clone(),
        };
        SkippedPath::new(path, FailureStage::Extraction, self.to_string())
    }
}
