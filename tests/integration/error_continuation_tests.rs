use dupscan::duplicates::{classify, Engine, EngineConfig, EngineError, ScanResult, WalkDurations};
use dupscan::error::ExitCode;
use dupscan::scanner::{fingerprint_all, FailureStage, Hasher, MetadataCollector};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn engine() -> Engine {
    Engine::new(EngineConfig::default().with_walk_threads(2).with_hash_threads(2))
}

#[test]
fn test_fingerprint_continues_past_missing_files() {
    let dir = tempdir().unwrap();
    let present = dir.path().join("present.txt");
    fs::write(&present, b"here").unwrap();
    let paths = vec![
        PathBuf::from("nonexistent_1.txt"),
        present.clone(),
        PathBuf::from("nonexistent_2.txt"),
    ];

    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let report = fingerprint_all(&pool, &Hasher::new(), &paths, None);

    assert_eq!(report.digests.len(), 1);
    assert!(report.digests.contains_key(&present));
    assert_eq!(report.failures.len(), 2);
    for failure in report.failures {
        assert_eq!(failure.into_skipped().stage, FailureStage::Fingerprint);
    }
}

#[test]
fn test_file_removed_before_hashing_is_skipped_and_others_found() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.txt");
    let copy = dir.path().join("report (copy).txt");
    let doomed = dir.path().join("doomed.txt");
    fs::write(&report, b"same").unwrap();
    fs::write(&copy, b"same").unwrap();
    fs::write(&doomed, b"short-lived").unwrap();

    let collector = MetadataCollector::new();
    collector.collect_batch(&[report.clone(), copy.clone(), doomed.clone()]);
    assert_eq!(collector.len(), 3);
    fs::remove_file(&doomed).unwrap();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let fingerprints = fingerprint_all(&pool, &Hasher::new(), &collector.paths(), None);
    for failure in fingerprints.failures {
        collector.record_skipped(failure.into_skipped());
    }
    let (records, failures) = collector.drain();
    let classification = classify(&records, &fingerprints.digests, None);
    let result = ScanResult::assemble(
        dir.path().to_path_buf(),
        records,
        &fingerprints.digests,
        classification,
        Vec::new(),
        WalkDurations::default(),
        failures,
    );

    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].path, doomed);
    assert_eq!(result.failures()[0].stage, FailureStage::Fingerprint);

    let rows = result.exact_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].path1, copy);
    assert_eq!(rows[0].path2, report);
    assert!(rows[0].content_match);
    assert!(result.metadata()[&doomed].content_digest.is_none());
    assert_eq!(ExitCode::for_result(&result), ExitCode::PartialSuccess);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_skipped_and_others_found() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("report.txt"), b"same").unwrap();
    fs::write(dir.path().join("report (copy).txt"), b"same").unwrap();
    let locked = dir.path().join("secret.key");
    fs::write(&locked, b"hidden").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read(&locked).is_ok() {
        // Running with privileges that ignore permissions.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let result = engine().scan(dir.path()).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    let failure = result
        .failures()
        .iter()
        .find(|f| f.path.ends_with("secret.key"))
        .expect("unreadable file listed in failures");
    assert_eq!(failure.stage, FailureStage::Fingerprint);

    let rows = result.exact_rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].content_match);
    assert_eq!(ExitCode::for_result(&result), ExitCode::PartialSuccess);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let closed = dir.path().join("closed");
    fs::create_dir(&closed).unwrap();
    fs::write(closed.join("inside.txt"), b"x").unwrap();
    fs::write(dir.path().join("outside.txt"), b"y").unwrap();
    fs::set_permissions(&closed, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&closed).is_ok() {
        fs::set_permissions(&closed, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = engine().scan(dir.path());
    fs::set_permissions(&closed, fs::Permissions::from_mode(0o755)).unwrap();
    let result = result.unwrap();

    assert!(result
        .failures()
        .iter()
        .any(|f| f.stage == FailureStage::Traversal));
    assert!(result.metadata().values().any(|r| r.name == "outside.txt"));
}

#[test]
fn test_interrupt_returns_no_partial_result() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let err = Engine::new(EngineConfig::default().with_shutdown_flag(flag))
        .scan(dir.path())
        .unwrap_err();

    assert!(matches!(err, EngineError::Interrupted));
    assert_eq!(ExitCode::for_error(&anyhow::Error::new(err)), ExitCode::Interrupted);
}

#[test]
fn test_timeout_maps_to_interrupted_exit_code() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();

    let err = Engine::new(EngineConfig::default().with_timeout(Duration::ZERO))
        .scan(dir.path())
        .unwrap_err();

    assert!(matches!(err, EngineError::TimedOut(_)));
    let err = anyhow::Error::new(err).context("Failed to scan");
    assert_eq!(ExitCode::for_error(&err), ExitCode::Interrupted);
}

#[test]
fn test_missing_root_is_general_error() {
    let dir = tempdir().unwrap();
    let err = engine().scan(&dir.path().join("gone")).unwrap_err();
    assert!(matches!(err, EngineError::RootNotFound(_)));
    assert_eq!(ExitCode::for_error(&anyhow::Error::new(err)), ExitCode::GeneralError);
}
