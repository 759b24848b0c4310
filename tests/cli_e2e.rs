//! End-to-end CLI tests for the capcache binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary isolated from any user config file.
fn capcache(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("capcache").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    capcache(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("packet captures"))
        .stdout(predicate::str::contains("--links"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    capcache(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("capcache"));
}

/// Test that the link file is required.
#[test]
fn test_binary_without_links_fails() {
    let home = TempDir::new().unwrap();
    capcache(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--links"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    capcache(&home)
        .args(["--links", "l.tsv", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_out_of_range_concurrency_rejected() {
    let home = TempDir::new().unwrap();
    capcache(&home)
        .args(["--links", "l.tsv", "-c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_binary_invalid_config_is_startup_error() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "speed = 11\n").unwrap();

    capcache(&home)
        .args(["--links", "l.tsv", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_binary_invalid_default_config_is_startup_error() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("config").join("capcache");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "concurrency = 0\n").unwrap();

    capcache(&home)
        .args(["--links", "l.tsv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_binary_missing_tools_is_startup_error() {
    let home = TempDir::new().unwrap();
    let empty_path = home.path().join("bin");
    std::fs::create_dir_all(&empty_path).unwrap();

    capcache(&home)
        .env("PATH", &empty_path)
        .args(["--links", "l.tsv", "-q"])
        .arg("--cache-dir")
        .arg(home.path().join("cache"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Wireshark command-line tools"));
    assert!(!home.path().join("cache").join("captures.json").exists());
}
