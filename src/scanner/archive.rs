//! Archive detection and extraction.
//!
//! # Overview
//!
//! Archives found during a scan are extracted into a sibling folder named
//! after the archive (`photos/trip.zip` → `photos/trip/`). The extracted tree
//! is then walked like any other folder, so its files become ordinary scan
//! targets, and searched again for nested archives.
//!
//! Supported formats:
//! - `.zip`
//! - `.tar`
//! - `.gz`: tried as a zip container first, then as `.tar.gz`, then as a
//!   single gzip-compressed file
//!
//! `.bz2`, `.rar` and `.7z` are recognized but not extracted; they fail with
//! [`ExtractionError::Unsupported`] and the scan continues.
//!
//! Nesting is bounded by [`ArchiveExpander`]'s depth limit and every archive
//! is expanded at most once per expander. Extraction checks the scan's
//! cancellation token between entries, so a large archive does not hold up
//! shutdown.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use flate2::read::GzDecoder;

use super::walker::{ScanContext, TreeWalk};
use super::{ExtractionError, FailureStage, SkippedPath};
use crate::signal::CancelToken;

/// Suffixes recognized as archives (compared case-insensitively).
pub const ARCHIVE_SUFFIXES: &[&str] = &["zip", "tar", "gz", "bz2", "rar", "7z"];

/// Default nesting limit for archives inside extracted archives.
pub const DEFAULT_MAX_ARCHIVE_DEPTH: usize = 4;

/// Chunk size for cancellable copies out of an archive.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Whether `path` carries a recognized archive suffix.
#[must_use]
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ARCHIVE_SUFFIXES.contains(&ext.as_str()))
}

/// Sibling folder an archive is extracted into: the archive path with its
/// last extension removed.
#[must_use]
pub fn extraction_folder(archive: &Path) -> PathBuf {
    archive.with_extension("")
}

/// Extract `archive` into `dest`, preserving its directory structure.
///
/// # Errors
///
/// Returns [`ExtractionError`] if the format is unsupported, the archive is
/// corrupt, or the contents cannot be written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
    extract_archive_cancellable(archive, dest, &CancelToken::new())
}

/// Like [`extract_archive`], but stops between entries and between copy
/// chunks once `cancel` trips.
///
/// # Errors
///
/// As [`extract_archive`], plus [`ExtractionError::Interrupted`] when
/// cancelled. Files already written are left in place.
pub fn extract_archive_cancellable(
    archive: &Path,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<(), ExtractionError> {
    let ext = archive
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "zip" => extract_zip(archive, dest, cancel),
        "tar" => {
            let file = open(archive)?;
            unpack_tar(archive, BufReader::new(file), dest, cancel)
        }
        "gz" => extract_gz(archive, dest, cancel),
        _ => Err(ExtractionError::Unsupported(archive.to_path_buf())),
    }
}

fn open(archive: &Path) -> Result<File, ExtractionError> {
    File::open(archive).map_err(|source| ExtractionError::Io {
        path: archive.to_path_buf(),
        source,
    })
}

fn io_error(archive: &Path) -> impl Fn(io::Error) -> ExtractionError + '_ {
    move |source| ExtractionError::Io {
        path: archive.to_path_buf(),
        source,
    }
}

fn zip_error(archive: &Path, error: zip::result::ZipError) -> ExtractionError {
    match error {
        zip::result::ZipError::Io(source) => ExtractionError::Io {
            path: archive.to_path_buf(),
            source,
        },
        other => ExtractionError::Corrupt {
            path: archive.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn decode_error(archive: &Path, error: io::Error) -> ExtractionError {
    match error.kind() {
        io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Other => ExtractionError::Corrupt {
            path: archive.to_path_buf(),
            reason: error.to_string(),
        },
        _ => ExtractionError::Io {
            path: archive.to_path_buf(),
            source: error,
        },
    }
}

/// Copy `reader` into `writer` in fixed chunks, checking `cancel` before
/// each one. Returns `Ok(false)` if cancelled.
fn copy_cancellable<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancelToken,
) -> io::Result<bool> {
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(true),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
    }
}

fn extract_zip(archive: &Path, dest: &Path, cancel: &CancelToken) -> Result<(), ExtractionError> {
    let file = open(archive)?;
    let mut zip =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(archive, e))?;

    fs::create_dir_all(dest).map_err(io_error(archive))?;
    for index in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Interrupted(archive.to_path_buf()));
        }
        let mut entry = zip.by_index(index).map_err(|e| zip_error(archive, e))?;
        let Some(relative) = entry.enclosed_name() else {
            log::warn!(
                "Skipping unsafe entry '{}' in {}",
                entry.name(),
                archive.display()
            );
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(archive))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(archive))?;
        }
        let mut out = File::create(&target).map_err(io_error(archive))?;
        if !copy_cancellable(&mut entry, &mut out, cancel).map_err(io_error(archive))? {
            drop(out);
            let _ = fs::remove_file(&target);
            return Err(ExtractionError::Interrupted(archive.to_path_buf()));
        }
    }
    Ok(())
}

fn unpack_tar<R: Read>(
    archive: &Path,
    reader: R,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<(), ExtractionError> {
    fs::create_dir_all(dest).map_err(io_error(archive))?;
    let mut tar = tar::Archive::new(reader);
    for entry in tar.entries().map_err(|e| decode_error(archive, e))? {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Interrupted(archive.to_path_buf()));
        }
        let mut entry = entry.map_err(|e| decode_error(archive, e))?;
        // `unpack_in` refuses entries that would land outside `dest`.
        if !entry.unpack_in(dest).map_err(|e| decode_error(archive, e))? {
            log::warn!(
                "Skipping unsafe entry '{}' in {}",
                entry.path().map(|p| p.display().to_string()).unwrap_or_default(),
                archive.display()
            );
        }
    }
    Ok(())
}

fn extract_gz(archive: &Path, dest: &Path, cancel: &CancelToken) -> Result<(), ExtractionError> {
    match extract_zip(archive, dest, cancel) {
        Ok(()) => return Ok(()),
        Err(e @ ExtractionError::Interrupted(_)) => return Err(e),
        Err(e) => log::debug!("{} is not a zip payload ({}), trying gzip", archive.display(), e),
    }

    let decoder = GzDecoder::new(BufReader::new(open(archive)?));
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.ends_with(".tar.gz") {
        return unpack_tar(archive, decoder, dest, cancel);
    }

    // Plain gzip: a single file named after the archive minus `.gz`.
    let stem = archive
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("content"));
    fs::create_dir_all(dest).map_err(io_error(archive))?;
    let target = dest.join(stem);
    let mut decoder = decoder;
    let result = File::create(&target)
        .and_then(|mut out| copy_cancellable(&mut decoder, &mut out, cancel));
    match result {
        Ok(true) => Ok(()),
        Ok(false) => {
            let _ = fs::remove_file(&target);
            Err(ExtractionError::Interrupted(archive.to_path_buf()))
        }
        Err(e) => {
            let _ = fs::remove_file(&target);
            Err(decode_error(archive, e))
        }
    }
}

/// Counters from one expansion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionOutcome {
    /// Archive files discovered
    pub archives_found: usize,
    /// Archives successfully extracted and walked
    pub extracted: usize,
    /// Archives that failed to extract
    pub failed: usize,
    /// Archives skipped because the nesting limit was reached
    pub depth_limited: usize,
}

/// Finds archives under a folder, extracts them and walks the results.
#[derive(Debug)]
pub struct ArchiveExpander {
    max_depth: usize,
    visited: Mutex<HashSet<PathBuf>>,
}

impl Default for ArchiveExpander {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ARCHIVE_DEPTH)
    }
}

impl ArchiveExpander {
    /// Create an expander that extracts at most `max_depth` levels of nesting.
    ///
    /// A depth of 0 disables extraction entirely.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            visited: Mutex::new(HashSet::new()),
        }
    }

    /// Expand every archive under `root`, walking each extracted folder with
    /// `walker` and then expanding archives nested inside it.
    pub fn expand_tree(
        &self,
        root: &Path,
        walker: &dyn TreeWalk,
        ctx: &ScanContext,
    ) -> ExpansionOutcome {
        let mut outcome = ExpansionOutcome::default();
        if let Some(ref callback) = ctx.progress {
            callback.on_message("Expanding archives");
        }
        self.expand_folder(root, 0, walker, ctx, &mut outcome);
        log::info!(
            "Archive expansion complete: {} found, {} extracted, {} failed, {} over depth limit",
            outcome.archives_found,
            outcome.extracted,
            outcome.failed,
            outcome.depth_limited
        );
        outcome
    }

    fn expand_folder(
        &self,
        folder: &Path,
        depth: usize,
        walker: &dyn TreeWalk,
        ctx: &ScanContext,
        outcome: &mut ExpansionOutcome,
    ) {
        for archive in find_archives(folder) {
            if ctx.cancel.is_cancelled() {
                log::debug!("Archive expansion cancelled");
                return;
            }
            if !self.first_visit(&archive) {
                log::trace!("Already expanded: {}", archive.display());
                continue;
            }
            outcome.archives_found += 1;

            if depth >= self.max_depth {
                outcome.depth_limited += 1;
                log::warn!(
                    "Not expanding {}: archive nesting limit ({}) reached",
                    archive.display(),
                    self.max_depth
                );
                ctx.collector.record_skipped(SkippedPath::new(
                    archive,
                    FailureStage::Extraction,
                    format!("archive nesting limit ({}) reached", self.max_depth),
                ));
                continue;
            }

            let dest = extraction_folder(&archive);
            log::info!("Exploring contents of: {}", archive.display());
            match extract_archive_cancellable(&archive, &dest, &ctx.cancel) {
                Ok(()) => {
                    outcome.extracted += 1;
                    walker.walk(&dest, ctx);
                    self.expand_folder(&dest, depth + 1, walker, ctx, outcome);
                }
                Err(ExtractionError::Interrupted(_)) => {
                    log::debug!("Extraction of {} cancelled", archive.display());
                    return;
                }
                Err(e) => {
                    outcome.failed += 1;
                    log::warn!("{}", e);
                    ctx.collector.record_skipped(e.into_skipped());
                }
            }
        }
    }

    /// Mark `archive` visited; false if it already was.
    fn first_visit(&self, archive: &Path) -> bool {
        let key = fs::canonicalize(archive).unwrap_or_else(|_| archive.to_path_buf());
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }
}

/// Every archive file under `folder`, in sorted order. Symlinks are ignored.
fn find_archives(folder: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(folder)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_archive(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}
