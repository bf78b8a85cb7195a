//! The single result structure of a scan, and its flattened row views.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::classifier::{Classification, DuplicateCluster};
use crate::scanner::{format_size, hash_to_hex, FileRecord, FolderTiming, Hash, SkippedPath};

/// One (anchor, member) pair of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRow {
    /// Anchor path
    pub path1: PathBuf,
    /// Member path
    pub path2: PathBuf,
    /// Whether the two files have identical content
    pub content_match: bool,
    /// Anchor file name
    pub name1: String,
    /// Member file name
    pub name2: String,
}

/// Display view of one [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRow {
    /// Full path
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Lowercased extension without the dot
    pub extension: String,
    /// Size formatted with [`format_size`]
    pub human_size: String,
    /// Guessed MIME type
    pub mime_type: Option<String>,
    /// Guessed MIME encoding
    pub mime_encoding: Option<String>,
}

impl From<&FileRecord> for MetadataRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            name: record.name.clone(),
            extension: record.extension.clone(),
            human_size: format_size(record.size_bytes),
            mime_type: record.mime_type.clone(),
            mime_encoding: record.mime_encoding.clone(),
        }
    }
}

/// Wall-clock totals measured by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkDurations {
    /// The single-threaded timing walk
    pub serial_total: Duration,
    /// The whole concurrent pass (walker plus archive expansion)
    pub parallel_total: Duration,
    /// The concurrent walker task alone
    pub concurrent_walk: Duration,
    /// The whole run: both walks, expansion, fingerprinting and classification
    pub mixed_total: Duration,
}

/// Headline numbers derived from a [`ScanResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    /// Files discovered
    pub total_files: usize,
    /// Sum of all file sizes
    pub total_size: u64,
    /// Files with a content digest
    pub fingerprinted: usize,
    /// Exact (anchor, member) pairs
    pub exact_pairs: usize,
    /// Fuzzy (anchor, member) pairs
    pub fuzzy_pairs: usize,
    /// Pairs, of either kind, whose content matches
    pub content_matches: usize,
    /// Paths skipped at any stage
    pub skipped: usize,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

fn as_record_list<S: Serializer>(
    records: &BTreeMap<PathBuf, FileRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.values())
}

/// Everything one scan produced. Built once by [`ScanResult::assemble`] and
/// read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    root: PathBuf,
    exact_clusters: Vec<DuplicateCluster>,
    fuzzy_clusters: Vec<DuplicateCluster>,
    #[serde(serialize_with = "as_record_list")]
    metadata: BTreeMap<PathBuf, FileRecord>,
    folder_timings: Vec<FolderTiming>,
    #[serde(serialize_with = "as_secs")]
    elapsed_serial_total: Duration,
    #[serde(serialize_with = "as_secs")]
    elapsed_parallel_total: Duration,
    #[serde(serialize_with = "as_secs")]
    elapsed_concurrent_walk: Duration,
    #[serde(serialize_with = "as_secs")]
    elapsed_mixed_total: Duration,
    failures: Vec<SkippedPath>,
}

impl ScanResult {
    /// Package the outputs of every stage.
    ///
    /// Each record's `content_digest` is filled from `digests`.
    #[must_use]
    pub fn assemble(
        root: PathBuf,
        mut metadata: BTreeMap<PathBuf, FileRecord>,
        digests: &HashMap<PathBuf, Hash>,
        classification: Classification,
        folder_timings: Vec<FolderTiming>,
        durations: WalkDurations,
        failures: Vec<SkippedPath>,
    ) -> Self {
        for (path, record) in &mut metadata {
            record.content_digest = digests.get(path).map(hash_to_hex);
        }
        Self {
            root,
            exact_clusters: classification.exact,
            fuzzy_clusters: classification.fuzzy,
            metadata,
            folder_timings,
            elapsed_serial_total: durations.serial_total,
            elapsed_parallel_total: durations.parallel_total,
            elapsed_concurrent_walk: durations.concurrent_walk,
            elapsed_mixed_total: durations.mixed_total,
            failures,
        }
    }

    /// Scanned root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exact clusters in anchor order.
    #[must_use]
    pub fn exact_clusters(&self) -> &[DuplicateCluster] {
        &self.exact_clusters
    }

    /// Fuzzy clusters in anchor order.
    #[must_use]
    pub fn fuzzy_clusters(&self) -> &[DuplicateCluster] {
        &self.fuzzy_clusters
    }

    /// Every discovered file, keyed by path.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<PathBuf, FileRecord> {
        &self.metadata
    }

    /// Per-folder timing comparison, sorted by folder name.
    #[must_use]
    pub fn folder_timings(&self) -> &[FolderTiming] {
        &self.folder_timings
    }

    /// Wall time of the serial timing walk.
    #[must_use]
    pub fn elapsed_serial_total(&self) -> Duration {
        self.elapsed_serial_total
    }

    /// Wall time of the whole concurrent pass, archive expansion included.
    #[must_use]
    pub fn elapsed_parallel_total(&self) -> Duration {
        self.elapsed_parallel_total
    }

    /// Wall time of the concurrent walker task alone.
    #[must_use]
    pub fn elapsed_concurrent_walk(&self) -> Duration {
        self.elapsed_concurrent_walk
    }

    /// Wall time from the validated root to the end of classification.
    #[must_use]
    pub fn elapsed_mixed_total(&self) -> Duration {
        self.elapsed_mixed_total
    }

    /// Paths skipped at any stage.
    #[must_use]
    pub fn failures(&self) -> &[SkippedPath] {
        &self.failures
    }

    /// Whether any path was skipped.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Whether any cluster was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.exact_clusters.is_empty() || !self.fuzzy_clusters.is_empty()
    }

    /// Serial walk time divided by concurrent walk time.
    ///
    /// `None` when the concurrent walk took no measurable time.
    #[must_use]
    pub fn speedup(&self) -> Option<f64> {
        let concurrent = self.elapsed_concurrent_walk.as_secs_f64();
        (concurrent > 0.0).then(|| self.elapsed_serial_total.as_secs_f64() / concurrent)
    }

    fn rows(&self, clusters: &[DuplicateCluster]) -> Vec<DuplicateRow> {
        clusters
            .iter()
            .flat_map(|cluster| {
                let anchor = cluster.anchor();
                cluster.members().iter().map(move |member| DuplicateRow {
                    path1: anchor.to_path_buf(),
                    path2: member.clone(),
                    content_match: cluster.is_content_match(member),
                    name1: self.name_of(anchor),
                    name2: self.name_of(member),
                })
            })
            .collect()
    }

    fn name_of(&self, path: &Path) -> String {
        self.metadata.get(path).map_or_else(
            || {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            },
            |r| r.name.clone(),
        )
    }

    /// One row per (anchor, member) pair of the exact clusters.
    #[must_use]
    pub fn exact_rows(&self) -> Vec<DuplicateRow> {
        self.rows(&self.exact_clusters)
    }

    /// One row per (anchor, member) pair of the fuzzy clusters.
    #[must_use]
    pub fn fuzzy_rows(&self) -> Vec<DuplicateRow> {
        self.rows(&self.fuzzy_clusters)
    }

    /// One row per discovered file, in path order.
    #[must_use]
    pub fn metadata_rows(&self) -> Vec<MetadataRow> {
        self.metadata.values().map(MetadataRow::from).collect()
    }

    /// Headline numbers.
    #[must_use]
    pub fn summary(&self) -> ScanSummary {
        let pairs = |clusters: &[DuplicateCluster]| -> usize {
            clusters.iter().map(DuplicateCluster::len).sum()
        };
        let matches: usize = self
            .exact_clusters
            .iter()
            .chain(&self.fuzzy_clusters)
            .map(|c| c.content_matches().len())
            .sum();
        ScanSummary {
            total_files: self.metadata.len(),
            total_size: self.metadata.values().map(|r| r.size_bytes).sum(),
            fingerprinted: self
                .metadata
                .values()
                .filter(|r| r.content_digest.is_some())
                .count(),
            exact_pairs: pairs(&self.exact_clusters),
            fuzzy_pairs: pairs(&self.fuzzy_clusters),
            content_matches: matches,
            skipped: self.failures.len(),
        }
    }
}
