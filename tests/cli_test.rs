//! CLI integration tests
//!
//! End-to-end tests for the panflow command-line interface. None of these
//! need a pandoc binary: conversions are pointed at a missing one.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MISSING_PANDOC: &str = "pandoc_path=/definitely/not/here/pandoc";

/// Get a Command for the panflow binary
fn panflow() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("panflow").expect("Failed to find panflow binary")
}

#[test]
fn test_help_output() {
    panflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validated document conversion"));
}

#[test]
fn test_version_output() {
    panflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("panflow"));
}

#[test]
fn test_subcommand_help_lists_options() {
    panflow()
        .args(["dir", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--recursive"))
        .stdout(predicate::str::contains("--pattern"));
}

#[test]
fn test_validate_markdown_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("in.html"), "<body>x</body>").unwrap();
    fs::write(dir.path().join("out.md"), "# Converted\n").unwrap();

    panflow()
        .args(["validate", "out.md", "in.html", "--project"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_validate_blank_output_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("in.html"), "<body>x</body>").unwrap();
    fs::write(dir.path().join("out.md"), "  \n").unwrap();

    panflow()
        .args(["validate", "out.md", "in.html", "--project"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed validation"));
}

#[test]
fn test_validate_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("in.html"), "<body>x</body>").unwrap();
    fs::write(dir.path().join("out.md"), "text").unwrap();

    let output = panflow()
        .args(["validate", "out.md", "in.html", "--json", "--project"])
        .arg(dir.path())
        .output()
        .expect("Failed to run panflow");
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(json["valid"], serde_json::Value::Bool(true));
}

#[test]
fn test_check_without_pandoc_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    panflow()
        .args(["check", "--set", MISSING_PANDOC, "--project"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pandoc not available"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        dir.path().join(".panflow.yaml"),
        "pandoc_options:\n  wrap: sideways\n",
    )
    .unwrap();

    panflow()
        .args(["check", "--project"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrap"));
}

#[test]
fn test_dir_rejects_unknown_target() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    panflow()
        .args(["dir", "docs", "--to", "pdf", "--project"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported target format"));
}

#[test]
fn test_html_without_pandoc_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("page.html"), "<body>x</body>").unwrap();

    panflow()
        .args(["html", "page.html", "--set", MISSING_PANDOC, "--project"])
        .arg(dir.path())
        .assert()
        .failure();
}
