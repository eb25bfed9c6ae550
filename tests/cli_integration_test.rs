//! CLI integration tests: run the itgen binary to cover main.rs branches.
//! Uses CARGO_BIN_EXE_itgen when set (e.g. by `cargo test`).

mod common;

use common::fixtures::LAYERED_APP_JSON;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn bin() -> Option<PathBuf> {
    option_env!("CARGO_BIN_EXE_itgen")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("CARGO_BIN_EXE_itgen").map(PathBuf::from))
}

fn write_model(dir: &Path) -> PathBuf {
    let path = dir.join("model.json");
    std::fs::write(&path, LAYERED_APP_JSON).expect("write model");
    path
}

fn run(bin: &Path, args: &[&str]) -> Output {
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run itgen")
}

#[test]
fn test_cli_help_succeeds() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE_itgen not set");
        return;
    };
    let out = run(&bin, &["--help"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("itgen"));
    assert!(stdout.contains("generate"));
}

#[test]
fn test_cli_fails_when_model_missing() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE_itgen not set");
        return;
    };
    let out = run(&bin, &["nonexistent_model_12345.json", "summary"]);
    assert!(!out.status.success(), "expected failure when model missing");
}

#[test]
fn test_cli_generate_to_stdout() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE_itgen not set");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());

    let out = run(&bin, &[model.to_str().unwrap(), "generate"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let scenarios: serde_json::Value = serde_json::from_slice(&out.stdout).expect("JSON stdout");
    assert_eq!(scenarios.as_array().map(Vec::len), Some(5));
}

#[test]
fn test_cli_generate_tag_filter_to_file() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE_itgen not set");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());
    let output = dir.path().join("scenarios.json");

    let out = run(
        &bin,
        &[
            model.to_str().unwrap(),
            "generate",
            "--tag",
            "error_propagation",
            "--output",
            output.to_str().unwrap(),
        ],
    );
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(out.stdout.is_empty());

    let written = std::fs::read_to_string(&output).unwrap();
    let scenarios: serde_json::Value = serde_json::from_str(&written).unwrap();
    let arr = scenarios.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["tag"], "error_propagation");
}

#[test]
fn test_cli_summary_and_errors() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE_itgen not set");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());

    let out = run(&bin, &[model.to_str().unwrap(), "summary"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Boundaries: 1"));
    assert!(stdout.contains("workflow"));

    let out = run(
        &bin,
        &[model.to_str().unwrap(), "errors", "--unit", "app.Service.get_user"],
    );
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("NotFound (propagated)"));
}

#[test]
fn test_cli_rejects_invalid_limits() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE_itgen not set");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());

    let out = run(
        &bin,
        &[model.to_str().unwrap(), "summary", "--max-path-length", "0"],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("max_path_length"));
}
