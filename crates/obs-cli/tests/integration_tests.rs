//! Integration tests for the obscura binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("obscura").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Obscura"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("obscura").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_transform_missing_file() {
    let output = Command::cargo_bin("obscura")
        .unwrap()
        .arg("transform")
        .arg("nonexistent.py")
        .output()
        .expect("obscura should run");

    assert!(!output.status.success(), "expected failure for missing file");
    let out_all = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        out_all.contains("does not exist"),
        "expected 'does not exist' in either stdout or stderr, got: {}",
        out_all
    );
}

#[test]
fn test_cli_encode_then_inspect() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("hello.py");
    fs::write(&input, "print('hi')\n").unwrap();

    Command::cargo_bin("obscura")
        .unwrap()
        .arg("encode")
        .arg(&input)
        .arg("--layers")
        .arg("2")
        .assert()
        .success();

    Command::cargo_bin("obscura")
        .unwrap()
        .arg("inspect")
        .arg(temp_dir.path().join("hello_obf_ml2.py"))
        .assert()
        .success()
        .stdout(predicate::eq("print('hi')\n"));
}

#[test]
fn test_cli_check_syntax_error_fails() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("broken.py");
    fs::write(&input, "def broken(:\n").unwrap();

    Command::cargo_bin("obscura")
        .unwrap()
        .arg("check")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Syntax error"));
}

#[test]
fn test_cli_invalid_command() {
    let mut cmd = Command::cargo_bin("obscura").unwrap();
    cmd.arg("invalid_command");

    cmd.assert().failure();
}
