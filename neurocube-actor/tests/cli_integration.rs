//! Integration tests for the neurocube-actor binary

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Path to the neurocube-actor binary
fn actor_bin() -> PathBuf {
    let mut path = env::current_exe().expect("Failed to get current executable path");
    path.pop(); // Remove test executable name
    if path.ends_with("deps") {
        path.pop(); // Remove deps directory
    }
    path.push("neurocube-actor");
    path
}

fn write_config(dir: &Path, n: usize) -> PathBuf {
    let corpus = dir.join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("unsat.cnf"), "p cnf 1 2\n1 0\n-1 0\n").unwrap();

    let config = serde_json::json!({
        "actors": [{
            "n": n,
            "dimacs_dir": corpus,
            "cubers": [{ "kind": "none" }],
            "branchers": [{ "kind": "occurrence" }]
        }],
        // nothing listens on port 1
        "server_name": "127.0.0.1:1"
    });
    let path = dir.join("fleet.json");
    fs::write(&path, config.to_string()).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let output = Command::new(actor_bin())
        .arg("--help")
        .output()
        .expect("Failed to execute neurocube-actor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
    assert!(stdout.contains("--actor_config"));
    assert!(!stdout.contains("--worker-index"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(actor_bin())
        .arg("--version")
        .output()
        .expect("Failed to execute neurocube-actor");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("neurocube-actor"));
}

#[test]
fn test_missing_config_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(actor_bin())
        .arg("--actor_config")
        .arg(dir.path().join("absent.json"))
        .output()
        .expect("Failed to execute neurocube-actor");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}

#[test]
fn test_malformed_config_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    fs::write(&path, "{ \"actors\": [").unwrap();

    let output = Command::new(actor_bin())
        .arg("--actor_config")
        .arg(&path)
        .output()
        .expect("Failed to execute neurocube-actor");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_worker_without_server_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), 1);

    let output = Command::new(actor_bin())
        .arg("--actor_config")
        .arg(&config)
        .args(["--worker-index", "0"])
        .output()
        .expect("Failed to execute neurocube-actor");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("127.0.0.1:1"));
}

#[test]
fn test_fleet_reports_failed_workers() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), 2);

    let output = Command::new(actor_bin())
        .arg("--actor_config")
        .arg(&config)
        .arg("--quiet")
        .output()
        .expect("Failed to execute neurocube-actor");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[0, 1]"), "stderr: {stderr}");
}
