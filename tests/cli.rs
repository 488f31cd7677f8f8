//! Command-line behaviour that does not need a Docker daemon

use assert_cmd::Command;
use predicates::prelude::*;

fn launcher() -> Command {
    Command::cargo_bin("sandbox-launch").unwrap()
}

#[test]
fn test_help_lists_options() {
    launcher()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--runtime-path"))
        .stdout(predicate::str::contains("--no-pull"));
}

#[test]
fn test_image_is_required() {
    launcher()
        .assert()
        .failure()
        .stderr(predicate::str::contains("<IMAGE>"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_unreadable_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");

    launcher()
        .arg("--settings")
        .arg(&missing)
        .args(["alpine", "echo", "hello"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("loading settings from"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_invalid_settings_are_rejected_before_docker() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, r#"{"monitor": {"intervalMs": 0}}"#).unwrap();

    launcher()
        .arg("--settings")
        .arg(&settings)
        .arg("alpine")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("monitor interval"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_runtime_override_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.toml");
    std::fs::write(&settings, "").unwrap();

    launcher()
        .arg("--settings")
        .arg(&settings)
        .args(["--runtime-path", "relative/runsc", "alpine"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must be absolute"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_unbalanced_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, "{}").unwrap();

    launcher()
        .arg("--settings")
        .arg(&settings)
        .args(["--command-line", "echo 'hello", "alpine"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid --command-line"));
}
