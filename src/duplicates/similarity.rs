//! File-name similarity scoring.
//!
//! Names are normalized before comparison: lowercased, with the markers that
//! file managers append to copies stripped from the stem (` (copy)`,
//! ` - copy`, `copy of `, ` (2)`, ` copy`, ` copy 3`, `_copy`). The score is
//! the insertion/deletion ratio `2·M / (len_a + len_b)` of the normalized
//! names, where `M` is the length of their longest common subsequence,
//! scaled to `0..=100` and rounded half to even.
//!
//! ```
//! use dupscan::duplicates::similarity::{name_similarity, normalize_name};
//!
//! assert_eq!(normalize_name("Report (Copy).TXT"), "report.txt");
//! assert_eq!(name_similarity("report.txt", "report (copy).txt"), 100);
//! assert_eq!(name_similarity("img_final.png", "img_final_v2.png"), 90);
//! ```

/// A pair scoring above this is an exact name match.
pub const EXACT_THRESHOLD: u8 = 99;

/// A pair scoring above this (and not above [`EXACT_THRESHOLD`]) is a fuzzy match.
pub const FUZZY_THRESHOLD: u8 = 80;

const PREFIX_MARKERS: &[&str] = &["copy of "];
const SUFFIX_MARKERS: &[&str] = &[" (copy)", " - copy", "_copy", " copy"];

/// Lowercase `name` and strip copy markers from its stem.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let (mut stem, extension) = match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext)),
        _ => (lower.clone(), None),
    };

    while let Some(stripped) = strip_marker(&stem) {
        stem = stripped.to_string();
    }

    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Remove one copy marker, never leaving an empty stem.
fn strip_marker(stem: &str) -> Option<&str> {
    let candidate = PREFIX_MARKERS
        .iter()
        .find_map(|m| stem.strip_prefix(m))
        .or_else(|| SUFFIX_MARKERS.iter().find_map(|m| stem.strip_suffix(m)))
        .or_else(|| strip_counter(stem))?;

    let candidate = candidate.trim_end();
    (!candidate.is_empty()).then_some(candidate)
}

/// Strip a trailing ` (N)` or ` copy N`.
fn strip_counter(stem: &str) -> Option<&str> {
    if let Some(inner) = stem.strip_suffix(')') {
        if let Some((rest, digits)) = inner.rsplit_once(" (") {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return Some(rest);
            }
        }
    }

    let without_digits = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() < stem.len() {
        return without_digits.strip_suffix(" copy ");
    }
    None
}

/// Similarity of two file names in `0..=100`. Symmetric.
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> u8 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    (indel_ratio(&a, &b) * 100.0)
        .round_ties_even()
        .clamp(0.0, 100.0) as u8
}

/// `2·LCS / (len_a + len_b)` over chars; two empty strings are identical.
fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
