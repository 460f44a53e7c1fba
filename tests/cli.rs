//! Smoke tests for the `qsync` binary.

use std::path::Path;

use assert_cmd::Command;
use rusqlite::Connection;
use tempfile::TempDir;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = serde_json::json!({
        "local_db": dir.join("local.db"),
        "remote_db": dir.join("nas").join("master.db"),
        "username": "cli-test",
        "tables": [{"name": "customers"}],
    });
    let path = dir.join("config.json");
    std::fs::write(&path, config.to_string()).unwrap();
    path
}

fn qsync(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("qsync").unwrap();
    cmd.env("HOME", home)
        .env_remove("QSYNC_CONFIG")
        .env_remove("QSYNC_LOCAL_DB")
        .env_remove("QSYNC_REMOTE_DB")
        .env_remove("QSYNC_USER")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn sync_then_history_as_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    std::fs::create_dir_all(dir.path().join("nas")).unwrap();
    Connection::open(dir.path().join("nas").join("master.db"))
        .unwrap()
        .execute_batch(
            "CREATE TABLE customers (id TEXT PRIMARY KEY, name TEXT, updated_at INTEGER, updated_by TEXT, synced_at INTEGER);
             INSERT INTO customers VALUES ('C1', 'Acme', 100, 'office', NULL);",
        )
        .unwrap();
    Connection::open(dir.path().join("local.db"))
        .unwrap()
        .execute_batch("CREATE TABLE customers (id TEXT PRIMARY KEY, name TEXT)")
        .unwrap();

    let output = qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("sync")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["stats"]["pulled"]["customers"], 1);

    let output = qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .args(["history", "--limit", "5"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let history: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(history["count"], 1);
    assert_eq!(history["runs"][0]["username"], "cli-test");
    assert_eq!(history["runs"][0]["status"], "success");
}

#[test]
fn unreachable_share_exits_with_sync_code() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("sync")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["reason"], "nas_unavailable");
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(error["error"]["code"], "REMOTE_UNAVAILABLE");
}

#[test]
fn status_without_local_store_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("status")
        .assert()
        .code(2);
    assert!(!dir.path().join("local.db").exists());
}

#[test]
fn missing_remote_path_is_a_config_error() {
    let dir = TempDir::new().unwrap();

    qsync(dir.path())
        .args(["--json", "--local-db"])
        .arg(dir.path().join("local.db"))
        .arg("sync")
        .assert()
        .code(7);
}

#[test]
fn init_writes_config_used_by_later_commands() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("settings").join("config.json");
    let local_db = dir.path().join("data").join("local.db");

    let output = qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("--local-db")
        .arg(&local_db)
        .arg("--remote-db")
        .arg(dir.path().join("nas").join("master.db"))
        .args(["--user", "installer", "init"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let init: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(init["username"], "installer");
    assert_eq!(init["tables"], 6);
    assert!(config.exists());
    assert!(local_db.exists());

    let output = qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("status")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["username"], "installer");

    qsync(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("init")
        .assert()
        .code(4);
}
