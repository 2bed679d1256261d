//! CLI integration tests for ras
//!
//! Runs the `ras` binary end-to-end using assert_cmd. Every test points the
//! config directory at its own temp dir so the user's config is never read.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a command with an isolated config directory
#[allow(deprecated)]
fn ras_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ras").unwrap();
    cmd.env("RAS_CONFIG_DIR", config_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_exec_lock_unlock_scenario() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args([
            "exec",
            "lock U1 R1",
            "lock U1 R1",
            "lock U2 R1",
            "unlock U2 R1",
            "unlock U1 R1",
            "lock U2 R1",
        ])
        .assert()
        .success()
        .stdout(
            "lock_succeeded R1 owner=U1 state=locked\n\
             lock_succeeded R1 owner=U1 state=locked\n\
             lock_failed R1 owner=U1 state=locked\n\
             unlock_failed R1 owner=U1 state=locked\n\
             unlock_succeeded R1 owner=U1 state=unlocked\n\
             lock_succeeded R1 owner=U2 state=locked\n",
        );
}

#[test]
fn test_exec_owner_comparison_ignores_case() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["exec", "lock alice R1", "unlock ALICE R1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "unlock_succeeded R1 owner=ALICE state=unlocked",
        ));
}

#[test]
fn test_exec_unknown_command_fails() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["exec", "lock U1 R1", "steal U2 R1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("lock_succeeded R1"))
        .stderr(predicate::str::contains("'steal' command is not supported"));
}

#[test]
fn test_exec_blank_statements_print_nothing() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["exec", "", "# just a comment"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_exec_lock_expires_after_timeout() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args([
            "exec",
            "--timeout",
            "100ms",
            "lock U1 R1",
            "sleep 400ms",
            "lock U2 R1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "lock_succeeded R1 owner=U2 state=locked",
        ));
}

#[test]
fn test_exec_never_timeout_lists_never() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["exec", "--timeout", "never", "lock U1 R1", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "R1 owner=U1 state=locked expires_at=never",
        ));
}

#[test]
fn test_exec_rejects_zero_timeout() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["exec", "--timeout", "0ms", "lock U1 R1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than zero"));
}

#[test]
fn test_exec_json_format() {
    let temp_dir = TempDir::new().unwrap();

    let output = ras_cmd(&temp_dir)
        .args(["--format", "json", "exec", "lock U1 R1", "lock U2 R1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["result"], "lock_succeeded");
    assert_eq!(first["key"], "R1");
    assert_eq!(first["resource"]["owner"], "U1");
    assert_eq!(first["resource"]["state"], "locked");

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["result"], "lock_failed");
    assert_eq!(second["resource"]["owner"], "U1");
}

#[test]
fn test_shell_reads_stdin() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["-q", "shell"])
        .write_stdin("lock U1 R1\nfrobnicate\nunlock U1 R1\nexit\nlock U2 R1\n")
        .assert()
        .success()
        .stdout(
            "lock_succeeded R1 owner=U1 state=locked\n\
             unlock_succeeded R1 owner=U1 state=unlocked\n",
        )
        .stderr(predicate::str::contains("'frobnicate' command is not supported"));
}

#[test]
fn test_shell_prints_banner() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["shell", "--timeout", "5s"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("unlock timeout 5s"));
}

#[test]
fn test_config_path_uses_override_dir() {
    let temp_dir = TempDir::new().unwrap();
    let expected = temp_dir.path().join("config.toml");

    ras_cmd(&temp_dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn test_config_set_get_list_reset() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["config", "get", "acquisition.unlock_timeout"])
        .assert()
        .success()
        .stdout("30s\n");

    ras_cmd(&temp_dir)
        .args(["config", "set", "acquisition.unlock_timeout", "2m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set acquisition.unlock_timeout = 2m"));

    assert!(temp_dir.path().join("config.toml").exists());

    ras_cmd(&temp_dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout("acquisition.unlock_timeout = 2m\n");

    ras_cmd(&temp_dir)
        .args(["config", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration reset"));

    ras_cmd(&temp_dir)
        .args(["config", "get", "acquisition.unlock_timeout"])
        .assert()
        .success()
        .stdout("30s\n");
}

#[test]
fn test_config_set_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["config", "set", "acquisition.unlock_timeout", "soon"])
        .assert()
        .failure();

    ras_cmd(&temp_dir)
        .args(["config", "set", "no.such.key", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));

    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_exec_uses_configured_timeout() {
    let temp_dir = TempDir::new().unwrap();

    ras_cmd(&temp_dir)
        .args(["-q", "config", "set", "acquisition.unlock_timeout", "never"])
        .assert()
        .success()
        .stdout("");

    ras_cmd(&temp_dir)
        .args(["exec", "lock U1 R1", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("expires_at=never"));
}
