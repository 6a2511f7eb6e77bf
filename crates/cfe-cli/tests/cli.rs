use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cfe(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cfe").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("CFE_MODEL_DIR");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn compare_reports_full_accuracy_for_identical_maps() {
    let dir = TempDir::new().unwrap();
    let fields = r#"{"serviceNumber": "123456789012", "consumptionKWh": 245, "currentAmount": 850}"#;
    let extracted = write(&dir, "extracted.json", fields);
    let truth = write(&dir, "truth.json", fields);

    cfe(dir.path())
        .args(["compare", "--extracted"])
        .arg(&extracted)
        .arg("--truth")
        .arg(&truth)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"overallAccuracy\": 100.0"))
        .stdout(predicate::str::contains("\"matchedFields\": 3"));
}

#[test]
fn compare_tolerates_small_numeric_deviation_and_reports_errors() {
    let dir = TempDir::new().unwrap();
    let extracted = write(
        &dir,
        "extracted.json",
        r#"{"consumptionKWh": 250, "tariffType": "1C"}"#,
    );
    let truth = write(
        &dir,
        "truth.json",
        r#"{"consumptionKWh": 245, "tariffType": "1C", "meterNumber": "AB1234"}"#,
    );

    cfe(dir.path())
        .args(["compare", "-e"])
        .arg(&extracted)
        .arg("-t")
        .arg(&truth)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"missedFields\": 1"))
        .stdout(predicate::str::contains("missing: AB1234 vs null"));
}

#[test]
fn compare_rejects_non_object_ground_truth() {
    let dir = TempDir::new().unwrap();
    let extracted = write(&dir, "extracted.json", "{}");
    let truth = write(&dir, "truth.json", "[1, 2, 3]");

    cfe(dir.path())
        .args(["compare", "--extracted"])
        .arg(&extracted)
        .arg("--truth")
        .arg(&truth)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ground truth"));
}

#[test]
fn config_show_prints_defaults_without_a_file() {
    let dir = TempDir::new().unwrap();

    cfe(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"numeric_tolerance\": 0.05"))
        .stdout(predicate::str::contains("\"ocr_fallback_threshold\": 0.6"));
}

#[test]
fn config_set_then_get() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cfe.json");

    cfe(dir.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "set", "metrics.top_errors", "3"])
        .assert()
        .success();

    cfe(dir.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "get", "metrics.top_errors"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));

    cfe(dir.path())
        .arg("-c")
        .arg(&path)
        .args(["config", "get", "metrics.nope"])
        .assert()
        .failure();
}

#[test]
fn report_on_empty_store_has_no_tests() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    fs::create_dir(&store).unwrap();

    cfe(dir.path())
        .args(["report", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalTests\": 0"));
}

#[test]
fn report_requires_existing_store() {
    let dir = TempDir::new().unwrap();

    cfe(dir.path())
        .args(["report", "--store"])
        .arg(dir.path().join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No result store"));
}

#[test]
fn consumption_reports_trend_and_forecast() {
    let dir = TempDir::new().unwrap();
    let history = write(
        &dir,
        "history.json",
        r#"[
            {"period": "2024-01-01", "kwh": 100},
            {"period": "2024-02-01", "kwh": 120},
            {"period": "2024-03-01", "kwh": 140},
            {"period": "2024-04-01", "kwh": 160}
        ]"#,
    );

    cfe(dir.path())
        .arg("consumption")
        .arg(&history)
        .args(["--forecast-months", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"trend\": \"increasing\""))
        .stdout(predicate::str::contains("\"period\": \"2024-05-01\""));
}

#[test]
fn consumption_needs_two_months() {
    let dir = TempDir::new().unwrap();
    let history = write(&dir, "history.json", r#"[{"period": "2024-01-01", "kwh": 100}]"#);

    cfe(dir.path())
        .arg("consumption")
        .arg(&history)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 months"));
}

#[test]
fn analyze_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    cfe(dir.path())
        .args(["analyze"])
        .arg(dir.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn report_rejects_out_of_range_day_window() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    fs::create_dir(&store).unwrap();

    cfe(dir.path())
        .args(["report", "--days", "9223372036854775807", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}
