//! Daemon lifecycle specs
//!
//! Verify daemon start/stop and the files it leaves behind.

use crate::prelude::*;

#[test]
fn status_reports_offline_queue() {
    let mut project = Project::empty();
    project.start_daemon();

    project
        .agsync()
        .args(&["status"])
        .passes()
        .stdout_has("Status: offline, up to date");
}

#[test]
fn stop_removes_runtime_files() {
    let mut project = Project::empty();
    project.start_daemon();

    project
        .agsync()
        .args(&["stop"])
        .passes()
        .stdout_has("Daemon stopped");
    project.wait_daemon_exit();

    assert!(!project.state_dir().join("agsyncd.pid").exists());
    assert!(!project.path().join("sock/agsyncd.sock").exists());
    project.agsync().args(&["status"]).fails();
}

#[test]
fn second_daemon_refuses_to_start() {
    let mut project = Project::empty();
    project.start_daemon();

    let status = project.agsyncd().status().unwrap();
    assert!(!status.success());
    assert!(project.daemon_log().contains("Failed to acquire lock"));

    // The running daemon is unaffected
    project.agsync().args(&["status"]).passes();
}

#[test]
fn startup_marker_precedes_log_output() {
    let mut project = Project::empty();
    project.start_daemon();

    let log = project.daemon_log();
    assert!(log.starts_with("--- agsyncd: starting (pid: "));
}

#[test]
fn invalid_config_fails_startup() {
    let project = Project::empty();
    std::fs::write(
        project.state_dir().join("agsync.toml"),
        "[queue]\ncapacity = 0\n",
    )
    .unwrap();

    let status = project.agsyncd().status().unwrap();
    assert!(!status.success());
    assert!(project.daemon_log().contains("queue.capacity must be > 0"));
    project
        .agsync()
        .args(&["status"])
        .fails()
        .stderr_has("Last startup failed");
}
