//! Integration tests for the lfa CLI
//!
//! These run the binary end-to-end with assert_cmd. Every test points
//! `LFA_CONFIG_DIR` at a temp directory so nothing touches the real
//! config or session, and none of them reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// An lfa command isolated to `dir`
fn lfa(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lfa").unwrap();
    cmd.env("LFA_CONFIG_DIR", dir.path())
        .env_remove("LFA_PROJECT_ID")
        .env_remove("LFA_API_KEY")
        .env_remove("LFA_DATABASE")
        .env_remove("LFA_TIMEOUT_SECS")
        .env_remove("LFA_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn write_session(dir: &TempDir) {
    let session = serde_json::json!({
        "uid": "admin-uid",
        "email": "admin@example.com",
        "id_token": "token",
        "refresh_token": "refresh",
        "expires_at": "2099-01-01T00:00:00Z",
    });
    fs::write(dir.path().join("session.json"), session.to_string()).unwrap();
}

// ============================================================================
// General
// ============================================================================

#[test]
fn test_help_lists_sections() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("items"))
        .stdout(predicate::str::contains("users"))
        .stdout(predicate::str::contains("notifications"));
}

#[test]
fn test_version() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lfa"));
}

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lfa"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_set_then_show() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "set", "project_id", "campus-lost-found"])
        .assert()
        .success();

    assert!(tmp.path().join("config.yaml").exists());

    lfa(&tmp)
        .args(["config", "show", "project_id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("campus-lost-found"));
}

#[test]
fn test_config_show_defaults_database() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "show", "database"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(default)"));
}

#[test]
fn test_config_env_overrides_file() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "set", "project_id", "from-file"])
        .assert()
        .success();

    lfa(&tmp)
        .env("LFA_PROJECT_ID", "from-env")
        .args(["config", "show", "project_id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-env"));
}

#[test]
fn test_config_set_unknown_key_fails() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "set", "editor", "vim"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("editor"));
}

#[test]
fn test_config_set_rejects_bad_timeout() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "set", "timeout_secs", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout_secs"));

    assert!(!tmp.path().join("config.yaml").exists());
}

#[test]
fn test_config_unset_without_file_fails() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "unset", "project_id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_config_unset_removes_key() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "set", "api_key", "AIzaSyExample1234"])
        .assert()
        .success();
    lfa(&tmp)
        .args(["config", "unset", "api_key"])
        .assert()
        .success();

    let contents = fs::read_to_string(tmp.path().join("config.yaml")).unwrap();
    assert!(!contents.contains("api_key"));
}

#[test]
fn test_config_keys() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["config", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("project_id"))
        .stdout(predicate::str::contains("timeout_secs"));
}

// ============================================================================
// Session
// ============================================================================

#[test]
fn test_items_list_requires_session() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["items", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_users_delete_requires_session() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["users", "delete", "u1", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_logout_without_session() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}

#[test]
fn test_logout_removes_session() {
    let tmp = TempDir::new().unwrap();
    write_session(&tmp);

    lfa(&tmp)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out"));

    assert!(!tmp.path().join("session.json").exists());
}

#[test]
fn test_whoami_json() {
    let tmp = TempDir::new().unwrap();
    write_session(&tmp);

    lfa(&tmp)
        .args(["whoami", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("admin@example.com"))
        .stdout(predicate::str::contains("admin-uid"));
}

#[test]
fn test_whoami_without_session_fails() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_login_without_api_key_fails() {
    let tmp = TempDir::new().unwrap();
    lfa(&tmp)
        .args(["login", "admin@example.com", "--password", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api_key"));
}
