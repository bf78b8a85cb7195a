//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - File-name similarity scoring ([`similarity`])
//! - Greedy anchor-based exact/fuzzy clustering ([`classifier`])
//! - The aggregated scan result and its row views ([`result`])
//! - End-to-end orchestration of a scan ([`engine`])

pub mod classifier;
pub mod engine;
pub mod result;
pub mod similarity;

pub use classifier::{classify, Classification, DuplicateCluster, MatchKind};
pub use engine::{default_hash_threads, default_walk_threads, Engine, EngineConfig, EngineError};
pub use result::{DuplicateRow, MetadataRow, ScanResult, ScanSummary, WalkDurations};
pub use similarity::{name_similarity, normalize_name, EXACT_THRESHOLD, FUZZY_THRESHOLD};
