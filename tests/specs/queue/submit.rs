//! Queueing specs: operations submitted offline are kept durably

use crate::prelude::*;

#[test]
fn submit_offline_is_queued() {
    let mut project = Project::empty();
    project.start_daemon();

    project
        .agsync()
        .args(&[
            "submit",
            "create-record",
            "harvest",
            r#"{"field": "north", "kg": 120}"#,
        ])
        .passes()
        .stdout_has("Queued: op-");

    project
        .agsync()
        .args(&["status"])
        .passes()
        .stdout_has("offline, 1 pending");
}

#[test]
fn queued_operations_survive_restart() {
    let mut project = Project::empty();
    project.start_daemon();
    for acres in ["10", "12"] {
        let payload = format!(r#"{{"recordId": "farm-7", "acres": {}}}"#, acres);
        project
            .agsync()
            .args(&["submit", "update-record", "farm", &payload])
            .passes();
    }

    project.agsync().args(&["stop"]).passes();
    project.wait_daemon_exit();
    project.start_daemon();

    project
        .agsync()
        .args(&["status"])
        .passes()
        .stdout_has("Pending: 2");
}

#[test]
fn invalid_json_is_refused_before_sending() {
    let mut project = Project::empty();
    project.start_daemon();

    project
        .agsync()
        .args(&["submit", "create-record", "farm", "{not json"])
        .fails()
        .stderr_has("Payload is not valid JSON");
}

#[test]
fn payload_missing_record_id_is_rejected() {
    let mut project = Project::empty();
    project.start_daemon();

    project
        .agsync()
        .args(&["submit", "update-record", "farm", r#"{"acres": 3}"#])
        .fails()
        .stderr_has("recordId");

    project
        .agsync()
        .args(&["status"])
        .passes()
        .stdout_has("up to date");
}

#[test]
fn dead_letters_empty_and_requeue_unknown() {
    let mut project = Project::empty();
    project.start_daemon();

    project
        .agsync()
        .args(&["dead-letters"])
        .passes()
        .stdout_has("No failed operations");
    project
        .agsync()
        .args(&["requeue", "op-missing"])
        .fails()
        .stderr_has("is not a failed operation");
}

#[test]
fn json_output_for_status() {
    let mut project = Project::empty();
    project.start_daemon();

    let run = project.agsync().args(&["status", "-o", "json"]).passes();
    let status: serde_json::Value = serde_json::from_str(&run.stdout()).unwrap();
    assert_eq!(status["online"], false);
    assert_eq!(status["pending_count"], 0);
}
