//! CLI 端到端测试

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_config_prints_default_toml() {
    Command::cargo_bin("calibur")
        .unwrap()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[tracker]"))
        .stdout(predicate::str::contains("ttl_s = 1.0"))
        .stdout(predicate::str::contains("[serial]"));
}

#[test]
fn test_config_check_rejects_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[aim]\nmax_iterations = 0\n").unwrap();

    Command::cargo_bin("calibur")
        .unwrap()
        .args(["config", "--check"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn test_send_test_dry_run() {
    Command::cargo_bin("calibur")
        .unwrap()
        .args(["send-test", "--dry-run", "--count", "3", "--interval-ms", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent 3 packets, 0 failed"));
}

#[test]
fn test_log_dir_receives_file() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("calibur")
        .unwrap()
        .args(["send-test", "--dry-run", "--count", "1", "--interval-ms", "0"])
        .arg("--log-dir")
        .arg(dir.path())
        .assert()
        .success();

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(!files.is_empty());
}
