use dupscan::duplicates::{Engine, EngineConfig, ScanResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn engine() -> Engine {
    Engine::new(
        EngineConfig::default()
            .with_walk_threads(4)
            .with_hash_threads(2),
    )
}

fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(content).unwrap();
}

fn name_pairs(rows: &[dupscan::duplicates::DuplicateRow]) -> Vec<(String, String, bool)> {
    rows.iter()
        .map(|r| (r.name1.clone(), r.name2.clone(), r.content_match))
        .collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let result = engine().scan(dir.path()).unwrap();

    assert!(result.metadata().is_empty());
    assert!(result.exact_rows().is_empty());
    assert!(result.fuzzy_rows().is_empty());
    assert_eq!(result.summary().total_files, 0);
}

#[test]
fn test_scan_copy_is_exact_with_content_match() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("report.txt"), b"quarterly numbers");
    write(&dir.path().join("report (copy).txt"), b"quarterly numbers");

    let result = engine().scan(dir.path()).unwrap();

    let pairs = name_pairs(&result.exact_rows());
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].2, "identical bytes must be a content match");
    let names = [pairs[0].0.as_str(), pairs[0].1.as_str()];
    assert!(names.contains(&"report.txt"));
    assert!(names.contains(&"report (copy).txt"));
    assert!(result.fuzzy_rows().is_empty());
}

#[test]
fn test_scan_version_suffix_is_fuzzy_without_content_match() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("img_final.png"), b"AAAAAAAA");
    write(&dir.path().join("img_final_v2.png"), b"BBBBBBBB");

    let result = engine().scan(dir.path()).unwrap();

    assert!(result.exact_rows().is_empty());
    let pairs = name_pairs(&result.fuzzy_rows());
    assert_eq!(
        pairs,
        vec![("img_final.png".to_string(), "img_final_v2.png".to_string(), false)]
    );
}

#[test]
fn test_scan_short_version_suffix_is_fuzzy() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("summary.docx"), b"draft one");
    write(&dir.path().join("summary_v3.docx"), b"draft two");

    let result = engine().scan(dir.path()).unwrap();

    assert!(result.exact_rows().is_empty());
    assert_eq!(
        name_pairs(&result.fuzzy_rows()),
        vec![("summary.docx".to_string(), "summary_v3.docx".to_string(), false)]
    );
}

#[test]
fn test_scan_same_name_different_size_is_not_a_duplicate() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a/data.csv"), b"1,2,3");
    write(&dir.path().join("b/data.csv"), b"1,2,3,4,5,6");

    let result = engine().scan(dir.path()).unwrap();
    assert!(!result.has_duplicates());
    assert_eq!(result.metadata().len(), 2);
}

#[test]
fn test_scan_same_name_same_size_different_content() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a/notes.md"), b"alpha");
    write(&dir.path().join("b/notes.md"), b"omega");

    let result = engine().scan(dir.path()).unwrap();
    let rows = result.exact_rows();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].content_match);
}

#[test]
fn test_scan_nested_directories_and_timings() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("photos/2023/beach.jpg"), b"jpeg-bytes");
    write(&dir.path().join("backup/photos/beach.jpg"), b"jpeg-bytes");
    write(&dir.path().join("docs/readme.txt"), b"hello");

    let result = engine().scan(dir.path()).unwrap();

    assert_eq!(result.metadata().len(), 3);
    assert_eq!(result.exact_rows().len(), 1);
    assert!(result.exact_rows()[0].content_match);

    let folders: Vec<&str> = result
        .folder_timings()
        .iter()
        .map(|t| t.folder_name.as_str())
        .collect();
    for expected in ["2023", "photos", "docs", "backup"] {
        assert!(folders.contains(&expected), "missing timing for {expected}");
    }
    assert!(result.elapsed_serial_total() > std::time::Duration::ZERO);
}

#[test]
fn test_whole_run_covers_both_walks() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        write(&dir.path().join(format!("part{}/chunk_{i}.dat", i % 3)), &[i as u8; 256]);
    }

    let result = engine().scan(dir.path()).unwrap();

    let walks = result.elapsed_parallel_total() + result.elapsed_serial_total();
    assert!(
        result.elapsed_mixed_total() >= walks,
        "whole run {:?} shorter than walks {:?}",
        result.elapsed_mixed_total(),
        walks
    );
    assert!(result.elapsed_parallel_total() >= result.elapsed_concurrent_walk());
}

#[test]
fn test_scan_records_metadata() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("Notes.txt"), &[b'x'; 1_500]);

    let result = engine().scan(dir.path()).unwrap();
    let record = result.metadata().values().next().unwrap();

    assert_eq!(record.name, "Notes.txt");
    assert_eq!(record.extension, "txt");
    assert_eq!(record.size_bytes, 1_500);
    assert_eq!(record.mime_type.as_deref(), Some("text/plain"));
    assert!(record.content_digest.is_some());

    let row = &result.metadata_rows()[0];
    assert_eq!(row.human_size, "1.50 KB");
}

#[test]
fn test_no_path_in_two_clusters() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "a (1).txt", "a (2).txt", "a_v2.txt", "b.txt"] {
        write(&dir.path().join(name), b"same");
    }

    let result = engine().scan(dir.path()).unwrap();
    let mut seen = std::collections::HashSet::new();
    for cluster in result.exact_clusters().iter().chain(result.fuzzy_clusters()) {
        for member in cluster.members() {
            assert!(seen.insert(member.clone()), "{} in two clusters", member.display());
        }
    }
}

fn stable_view(result: &ScanResult) -> (Vec<(String, String, bool)>, Vec<(String, String, bool)>, usize) {
    (
        name_pairs(&result.exact_rows()),
        name_pairs(&result.fuzzy_rows()),
        result.metadata().len(),
    )
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("report.txt"), b"v1");
    write(&dir.path().join("report copy.txt"), b"v1");
    write(&dir.path().join("summary_2023.doc"), b"old");
    write(&dir.path().join("summary_2024.doc"), b"new");

    let first = engine().scan(dir.path()).unwrap();
    let second = engine().scan(dir.path()).unwrap();

    assert_eq!(stable_view(&first), stable_view(&second));
}

#[test]
fn test_serial_and_parallel_pools_of_any_size_agree() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        write(&dir.path().join(format!("d{}/file{}.bin", i % 5, i)), format!("{i}").as_bytes());
    }

    let single = Engine::new(
        EngineConfig::default()
            .with_walk_threads(1)
            .with_hash_threads(1),
    )
    .scan(dir.path())
    .unwrap();
    let many = engine().scan(dir.path()).unwrap();

    assert_eq!(stable_view(&single), stable_view(&many));
}
