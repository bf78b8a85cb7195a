use dupscan::cli::OutputFormat;
use dupscan::duplicates::{Engine, EngineConfig, ScanResult};
use dupscan::error::ExitCode;
use dupscan::output::{CsvOutput, CsvTable, JsonOutput, TextOutput};
use dupscan::render;
use std::fs;
use tempfile::{tempdir, TempDir};

fn scanned() -> (TempDir, ScanResult) {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/report.txt"), b"numbers").unwrap();
    fs::write(dir.path().join("docs/report (copy).txt"), b"numbers").unwrap();
    fs::write(dir.path().join("img_final.png"), b"AAAA").unwrap();
    fs::write(dir.path().join("img_final_v2.png"), b"BBBB").unwrap();

    let result = Engine::new(EngineConfig::default().with_walk_threads(2))
        .scan(dir.path())
        .unwrap();
    (dir, result)
}

#[test]
fn test_json_export() {
    let (_dir, result) = scanned();
    let output = JsonOutput::new(&result, ExitCode::for_result(&result));
    let json: serde_json::Value = serde_json::from_str(&output.to_json_pretty().unwrap()).unwrap();

    assert_eq!(json["summary"]["total_files"], 4);
    assert_eq!(json["summary"]["exact_pairs"], 1);
    assert_eq!(json["summary"]["fuzzy_pairs"], 1);
    assert_eq!(json["summary"]["content_matches"], 1);
    assert_eq!(json["summary"]["exit_code_name"], "DS000");
    assert_eq!(json["metadata"].as_array().unwrap().len(), 4);
    assert!(json["folder_timings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["folder_name"] == "docs"));
}

#[test]
fn test_csv_exports_each_table() {
    let (_dir, result) = scanned();

    let exact = CsvOutput::new(&result, CsvTable::Exact).to_string().unwrap();
    assert_eq!(exact.lines().count(), 2);
    assert!(exact.lines().nth(1).unwrap().contains(",true,"));

    let fuzzy = CsvOutput::new(&result, CsvTable::Fuzzy).to_string().unwrap();
    assert!(fuzzy.contains("img_final.png,img_final_v2.png"));

    let metadata = CsvOutput::new(&result, CsvTable::Metadata).to_string().unwrap();
    assert_eq!(metadata.lines().count(), 5);

    let timing = CsvOutput::new(&result, CsvTable::Timing).to_string().unwrap();
    assert!(timing.starts_with("folder_name,serial_elapsed_secs,parallel_elapsed_secs"));
    assert!(timing.lines().any(|l| l.starts_with("docs,")));
}

#[test]
fn test_text_export() {
    let (_dir, result) = scanned();
    let text = TextOutput::new(&result).render();

    assert!(text.contains("Exact duplicates (1)"));
    assert!(text.contains("Fuzzy duplicates (1)"));
    assert!(text.contains("Skipped paths (0)"));
}

#[test]
fn test_render_dispatches_on_format() {
    let (_dir, result) = scanned();
    let code = ExitCode::for_result(&result);

    let mut json = Vec::new();
    render(&result, OutputFormat::Json, CsvTable::Exact, code, &mut json).unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&json).is_ok());

    let mut csv = Vec::new();
    render(&result, OutputFormat::Csv, CsvTable::Metadata, code, &mut csv).unwrap();
    assert!(String::from_utf8(csv).unwrap().starts_with("path,name,"));

    let mut text = Vec::new();
    render(&result, OutputFormat::Text, CsvTable::Exact, code, &mut text).unwrap();
    assert!(String::from_utf8(text).unwrap().starts_with("Scan of "));
}
