//! Help output specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    let project = Project::empty();
    let run = project.agsync().args(&["--help"]).passes();
    for command in ["submit", "status", "dead-letters", "requeue", "sync", "link", "stop"] {
        assert!(run.stdout().contains(command), "missing {}", command);
    }
}

#[test]
fn submit_requires_kind_target_and_payload() {
    let project = Project::empty();
    project
        .agsync()
        .args(&["submit", "create-record"])
        .fails()
        .stderr_has("TARGET_TYPE");
}
