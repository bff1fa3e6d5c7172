// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! This module provides enhanced error types that include:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use std::fmt;

use agsync_daemon::Paths;

use crate::client::{read_startup_error, ClientError};

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct CliError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// The daemon socket is missing or nobody is listening on it
    pub fn daemon_not_running(paths: &Paths) -> Self {
        let mut err = CliError::new("agsyncd is not running")
            .with_context(format!("No daemon is listening on {}", paths.socket_path.display()));
        if let Some(startup) = read_startup_error(paths) {
            err = err.with_context(format!("Last startup failed: {}", startup));
        }
        err.with_suggestion("Start the daemon: agsyncd")
            .with_suggestion(format!("Check the daemon log: {}", paths.log_path.display()))
    }

    pub fn storage_full(capacity: usize) -> Self {
        CliError::new("Operation not queued: local storage is full")
            .with_context(format!("{} operations are already waiting to sync", capacity))
            .with_suggestion("Reconnect so the queue can drain: agsync sync")
            .with_suggestion("Review failed operations: agsync dead-letters")
    }

    pub fn invalid_payload(err: &serde_json::Error) -> Self {
        CliError::new(format!("Payload is not valid JSON: {}", err))
            .with_suggestion(r#"Quote the payload, e.g. '{"recordId": "farm-7"}'"#)
    }

    pub fn from_client(err: ClientError, paths: &Paths) -> Self {
        match err {
            ClientError::DaemonNotRunning => CliError::daemon_not_running(paths),
            ClientError::StorageFull { capacity } => CliError::storage_full(capacity),
            ClientError::Rejected(message) => CliError::new(message),
            other => CliError::new(other.to_string()),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CliError {}
