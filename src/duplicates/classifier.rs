//! Greedy anchor-based duplicate clustering.
//!
//! # Policy
//!
//! Files are visited as anchors in sorted path order. For each anchor that is
//! not yet a member of some cluster, every other file that is not yet a member
//! is scored with [`name_similarity`]:
//!
//! - score `> 99` and equal size: exact member
//! - else score `> 80` and equal size: fuzzy member
//!
//! A member is marked processed and is never considered again, either as a
//! candidate or as an anchor. Anchors themselves are not marked. Each anchor
//! commits at most one exact and one fuzzy cluster.
//!
//! Because a fuzzy pairing also marks the candidate processed, a file that
//! fuzzily matched an earlier anchor can never become an exact member of a
//! later one. This ordering dependence is part of the policy.
//!
//! Every pair is compared, so the cost is quadratic in the number of files.
//! That is fine for thousands of files and slow for millions. Scoring for a
//! single anchor runs on the current rayon pool; membership is applied
//! sequentially, so the outcome matches a fully sequential pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use super::similarity::{name_similarity, EXACT_THRESHOLD, FUZZY_THRESHOLD};
use crate::progress::ProgressCallback;
use crate::scanner::{FileRecord, Hash};

/// Which rule put a member into its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Name similarity above the exact threshold
    Exact,
    /// Name similarity above the fuzzy threshold only
    Fuzzy,
}

impl MatchKind {
    /// Kind for a similarity score, if it qualifies at all.
    #[must_use]
    pub fn from_score(score: u8) -> Option<Self> {
        if score > EXACT_THRESHOLD {
            Some(Self::Exact)
        } else if score > FUZZY_THRESHOLD {
            Some(Self::Fuzzy)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// An anchor and the files that matched it under one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCluster {
    anchor: PathBuf,
    members: BTreeSet<PathBuf>,
    kind: MatchKind,
    content_matches: BTreeSet<PathBuf>,
}

impl DuplicateCluster {
    /// Build a cluster, deriving `content_matches` from `digests`.
    ///
    /// A member matches when both it and the anchor have a digest and the
    /// digests are equal.
    #[must_use]
    pub fn new(
        anchor: PathBuf,
        members: BTreeSet<PathBuf>,
        kind: MatchKind,
        digests: &HashMap<PathBuf, Hash>,
    ) -> Self {
        let content_matches = match digests.get(&anchor) {
            Some(anchor_digest) => members
                .iter()
                .filter(|m| digests.get(*m) == Some(anchor_digest))
                .cloned()
                .collect(),
            None => BTreeSet::new(),
        };
        Self {
            anchor,
            members,
            kind,
            content_matches,
        }
    }

    /// The anchor path.
    #[must_use]
    pub fn anchor(&self) -> &Path {
        &self.anchor
    }

    /// Members, excluding the anchor.
    #[must_use]
    pub fn members(&self) -> &BTreeSet<PathBuf> {
        &self.members
    }

    /// Rule that produced this cluster.
    #[must_use]
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Members whose content digest equals the anchor's.
    #[must_use]
    pub fn content_matches(&self) -> &BTreeSet<PathBuf> {
        &self.content_matches
    }

    /// Whether `member`'s content matches the anchor's.
    #[must_use]
    pub fn is_content_match(&self, member: &Path) -> bool {
        self.content_matches.contains(member)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for committed clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Exact and fuzzy clusters from one classification pass, in anchor order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Clusters built by the exact rule
    pub exact: Vec<DuplicateCluster>,
    /// Clusters built by the fuzzy rule
    pub fuzzy: Vec<DuplicateCluster>,
}

impl Classification {
    /// Whether no cluster was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.fuzzy.is_empty()
    }
}

/// Cluster `records` by name similarity and size.
///
/// `digests` only annotates clusters with content matches; files without a
/// digest still participate in clustering.
#[must_use]
pub fn classify(
    records: &BTreeMap<PathBuf, FileRecord>,
    digests: &HashMap<PathBuf, Hash>,
    progress: Option<&dyn ProgressCallback>,
) -> Classification {
    let entries: Vec<&FileRecord> = records.values().collect();
    let mut processed = vec![false; entries.len()];
    let mut result = Classification::default();

    log::info!("Classifying {} files", entries.len());
    if let Some(callback) = progress {
        callback.on_phase_start("classify", entries.len());
    }

    for (i, anchor) in entries.iter().enumerate() {
        if let Some(callback) = progress {
            callback.on_progress(i + 1, &anchor.path.to_string_lossy());
        }
        if processed[i] {
            continue;
        }

        let matches: Vec<(usize, MatchKind)> = entries
            .par_iter()
            .enumerate()
            .filter(|(j, candidate)| {
                *j != i && !processed[*j] && candidate.size_bytes == anchor.size_bytes
            })
            .filter_map(|(j, candidate)| {
                MatchKind::from_score(name_similarity(&anchor.name, &candidate.name))
                    .map(|kind| (j, kind))
            })
            .collect();

        let mut exact = BTreeSet::new();
        let mut fuzzy = BTreeSet::new();
        for (j, kind) in matches {
            processed[j] = true;
            let path = entries[j].path.clone();
            match kind {
                MatchKind::Exact => exact.insert(path),
                MatchKind::Fuzzy => fuzzy.insert(path),
            };
        }

        if !exact.is_empty() {
            log::trace!("{} exact member(s) for {}", exact.len(), anchor.path.display());
            result.exact.push(DuplicateCluster::new(
                anchor.path.clone(),
                exact,
                MatchKind::Exact,
                digests,
            ));
        }
        if !fuzzy.is_empty() {
            log::trace!("{} fuzzy member(s) for {}", fuzzy.len(), anchor.path.display());
            result.fuzzy.push(DuplicateCluster::new(
                anchor.path.clone(),
                fuzzy,
                MatchKind::Fuzzy,
                digests,
            ));
        }
    }

    if let Some(callback) = progress {
        callback.on_phase_end("classify");
    }
    log::info!(
        "Classification complete: {} exact, {} fuzzy clusters",
        result.exact.len(),
        result.fuzzy.len()
    );
    result
}
