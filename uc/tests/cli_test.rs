//! CLI tests for the `uc` binary

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn uc() -> Command {
    let mut cmd = Command::cargo_bin("uc").expect("uc binary builds");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_lists_commands() {
    uc().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_prints_effective_yaml() {
    let file = config_file(
        r#"
coordinator:
  name: weather
  update-interval-secs: 45
"#,
    );

    uc().arg("config")
        .arg("--config")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("update-interval-secs: 45"))
        .stdout(predicate::str::contains("name: weather"))
        .stdout(predicate::str::contains("fetch-timeout-secs: 10"));
}

#[test]
fn test_missing_config_file_fails() {
    uc().args(["config", "--config", "/nonexistent/uc.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_fetch_without_url_fails() {
    let file = config_file("log-level: error\n");

    uc().arg("fetch")
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No source URL"));
}

#[test]
fn test_fetch_unreachable_endpoint_fails() {
    let file = config_file("log-level: error\ncoordinator:\n  fetch-timeout-secs: 2\n");

    uc().args(["fetch", "--url", "http://127.0.0.1:1/state", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not ready"));
}

#[test]
fn test_zero_interval_is_rejected() {
    let file = config_file("log-level: error\n");

    uc().args(["watch", "--url", "http://127.0.0.1:1/", "--interval", "0", "--once", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("update-interval-secs must be greater than zero"));
}
