//! Error reporting specs

use crate::prelude::*;

#[test]
fn status_without_daemon_suggests_starting_it() {
    let project = Project::empty();
    project
        .agsync()
        .args(&["status"])
        .fails()
        .stderr_has("agsyncd is not running")
        .stderr_has("Start the daemon: agsyncd");
}

#[test]
fn unknown_kind_lists_valid_kinds() {
    let project = Project::empty();
    project
        .agsync()
        .args(&["submit", "upsert", "farm", "{}"])
        .fails()
        .stderr_has("append-telemetry");
}

#[test]
fn stop_without_daemon_is_not_an_error() {
    let project = Project::empty();
    project
        .agsync()
        .args(&["stop"])
        .passes()
        .stdout_has("Daemon not running");
}
