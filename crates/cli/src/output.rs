// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use agsync_core::{QueuedOperation, SyncStatus};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

pub fn print_status(status: &SyncStatus, format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", format_status(status)),
        OutputFormat::Json => print_json(status),
    }
}

pub fn format_status(status: &SyncStatus) -> String {
    let last_sync = status
        .last_successful_sync_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "Status: {}\n  Pending: {}\n  In flight: {}\n  Failed: {}\n  Last sync: {}\n  Syncing: {}\n",
        status.summary(),
        status.pending_count,
        status.in_flight_count,
        status.dead_letter_count,
        last_sync,
        if status.sync_in_progress { "yes" } else { "no" },
    )
}

pub fn print_dead_letters(operations: &[QueuedOperation], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(operations),
        OutputFormat::Text if operations.is_empty() => println!("No failed operations"),
        OutputFormat::Text => {
            println!(
                "{:<40} {:<18} {:<20} {:>8}  ERROR",
                "ID", "KIND", "TARGET", "ATTEMPTS"
            );
            for op in operations {
                println!(
                    "{:<40} {:<18} {:<20} {:>8}  {}",
                    op.id,
                    op.kind.as_str(),
                    op.target_type,
                    op.attempts,
                    op.last_error.as_deref().unwrap_or("-")
                );
            }
        }
    }
}
