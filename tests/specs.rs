//! Behavioral specifications for the agsync CLI and daemon.
//!
//! These tests are black-box: they invoke the `agsync` and `agsyncd`
//! binaries and verify stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// daemon/
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;

// queue/
#[path = "specs/queue/submit.rs"]
mod queue_submit;
