use dupscan::duplicates::{Engine, EngineConfig};
use dupscan::scanner::archive::extraction_folder;
use dupscan::scanner::FailureStage;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

fn engine() -> Engine {
    Engine::new(
        EngineConfig::default()
            .with_walk_threads(4)
            .with_hash_threads(2),
    )
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let staging = tempdir().unwrap();
    let path = staging.path().join("staging.zip");
    write_zip(&path, entries);
    fs::read(path).unwrap()
}

#[test]
fn test_duplicates_inside_zip_are_found() {
    let dir = tempdir().unwrap();
    write_zip(
        &dir.path().join("bundle.zip"),
        &[("contract.pdf", b"signed"), ("old/contract.pdf", b"signed")],
    );

    let result = engine().scan(dir.path()).unwrap();

    let rows = result.exact_rows();
    assert_eq!(rows.len(), 1, "rows: {rows:?}");
    assert!(rows[0].content_match);
    assert_eq!(rows[0].name1, "contract.pdf");
    assert!(rows[0].path1.components().any(|c| c.as_os_str() == "bundle"));

    // The archive itself stays in the tree and is recorded.
    assert!(result
        .metadata()
        .values()
        .any(|r| r.name == "bundle.zip"));
}

#[test]
fn test_archive_copy_matches_loose_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("budget.xlsx"), b"cells").unwrap();
    write_zip(&dir.path().join("backup.zip"), &[("budget.xlsx", b"cells")]);

    let result = engine().scan(dir.path()).unwrap();

    let rows = result.exact_rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].content_match);
}

#[test]
fn test_nested_archive_within_depth() {
    let dir = tempdir().unwrap();
    let inner = zip_bytes(&[("leaf.txt", b"leaf")]);
    write_zip(&dir.path().join("outer.zip"), &[("inner.zip", &inner)]);

    let result = engine().scan(dir.path()).unwrap();

    assert!(result.metadata().values().any(|r| r.name == "leaf.txt"));
}

#[test]
fn test_nested_archive_beyond_depth_is_left_packed() {
    let dir = tempdir().unwrap();
    let inner = zip_bytes(&[("leaf.txt", b"leaf")]);
    write_zip(&dir.path().join("outer.zip"), &[("inner.zip", &inner)]);

    let result = Engine::new(
        EngineConfig::default()
            .with_walk_threads(2)
            .with_max_archive_depth(1),
    )
    .scan(dir.path())
    .unwrap();

    assert!(result.metadata().values().any(|r| r.name == "inner.zip"));
    assert!(!result.metadata().values().any(|r| r.name == "leaf.txt"));
    assert_eq!(result.failures().len(), 1);
    let limited = &result.failures()[0];
    assert_eq!(limited.stage, FailureStage::Extraction);
    assert!(limited.path.ends_with("outer/inner.zip"));
    assert!(limited.reason.contains("nesting limit"));
}

#[test]
fn test_tar_gz_is_expanded() {
    let dir = tempdir().unwrap();
    let mut tar_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_bytes);
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "logs/app.log", &b"boot"[..]).unwrap();
        builder.finish().unwrap();
    }
    let archive = dir.path().join("logs.tar.gz");
    let mut encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap();

    let result = engine().scan(dir.path()).unwrap();

    assert!(extraction_folder(&archive).join("logs/app.log").exists());
    let record = result
        .metadata()
        .values()
        .find(|r| r.name == "app.log")
        .unwrap();
    assert_eq!(record.size_bytes, 4);
    let archive_record = result
        .metadata()
        .values()
        .find(|r| r.name == "logs.tar.gz")
        .unwrap();
    assert_eq!(archive_record.mime_encoding.as_deref(), Some("gzip"));
}

#[test]
fn test_corrupt_archive_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken.zip"), b"not really a zip").unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();

    let result = engine().scan(dir.path()).unwrap();

    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].stage, FailureStage::Extraction);
    assert!(result.failures()[0].path.ends_with("broken.zip"));
    assert_eq!(result.metadata().len(), 2);
}
