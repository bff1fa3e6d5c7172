// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for daemon client behavior.

use super::*;
use std::fs;
use tempfile::tempdir;

fn paths_in(dir: &std::path::Path) -> Paths {
    Paths::new(&dir.join("state"), &dir.join("sock"))
}

#[test]
fn connect_without_socket_reports_not_running() {
    let temp = tempdir().unwrap();
    let result = DaemonClient::connect(&paths_in(temp.path()));
    assert!(matches!(result, Err(ClientError::DaemonNotRunning)));
}

#[tokio::test]
async fn stale_socket_reports_not_running() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    fs::create_dir_all(paths.socket_path.parent().unwrap()).unwrap();
    // Bind then drop: the file stays but nobody listens
    drop(std::os::unix::net::UnixListener::bind(&paths.socket_path).unwrap());

    let client = DaemonClient::connect(&paths).unwrap();
    let err = client.status().await.unwrap_err();
    assert!(matches!(err, ClientError::DaemonNotRunning));
}

#[tokio::test]
async fn stop_when_not_running_is_a_no_op() {
    let temp = tempdir().unwrap();
    assert!(!daemon_stop(&paths_in(temp.path())).await.unwrap());
}

#[test]
fn pid_file_is_read_when_present() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    assert_eq!(read_daemon_pid(&paths), None);

    fs::create_dir_all(&paths.state_dir).unwrap();
    fs::write(&paths.lock_path, "12345\n").unwrap();
    assert_eq!(read_daemon_pid(&paths), Some(12345));
}

#[test]
fn startup_error_only_considers_latest_attempt() {
    let log = "\
--- agsyncd: starting (pid: 10) ---
ERROR Failed to start daemon: Config error: invalid config: bad
--- agsyncd: starting (pid: 11) ---
2026-01-01T00:00:00Z  INFO agsyncd: Daemon ready
";
    assert_eq!(startup_error_in(log), None);

    let log = "\
--- agsyncd: starting (pid: 11) ---
ERROR Failed to start daemon: Failed to acquire lock: daemon already running?
";
    assert_eq!(
        startup_error_in(log).as_deref(),
        Some("Failed to acquire lock: daemon already running?")
    );
}
