// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agsync - queue field operations for offline-first sync

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod error;
mod output;

use std::process::ExitCode;

use agsync_daemon::Paths;
use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, queue};

use crate::client::{ClientError, DaemonClient};
use crate::error::CliError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "agsync", version, about = "Offline-first sync for field operations")]
struct Cli {
    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue an operation for delivery
    Submit(queue::SubmitArgs),
    /// Show connectivity and queue status
    Status,
    /// List operations that failed permanently
    DeadLetters,
    /// Move a failed operation back into the queue
    Requeue(queue::RequeueArgs),
    /// Probe the remote now and drain the queue
    Sync,
    /// Report the local network link state
    Link(daemon::LinkArgs),
    /// Stop the daemon
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match Paths::from_env() {
        Ok(paths) => paths,
        Err(e) => {
            eprint!("{}", CliError::new(e.to_string()));
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &paths).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", into_cli_error(err, &paths));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, paths: &Paths) -> Result<()> {
    // Stop does not need a live connection
    if let Commands::Stop = cli.command {
        return daemon::stop(paths).await;
    }

    let client = DaemonClient::connect(paths)?;
    let format = cli.output;

    match cli.command {
        Commands::Submit(args) => queue::submit(&client, args, format).await,
        Commands::Status => daemon::status(&client, format).await,
        Commands::DeadLetters => queue::dead_letters(&client, format).await,
        Commands::Requeue(args) => queue::requeue(&client, args).await,
        Commands::Sync => daemon::sync(&client, format).await,
        Commands::Link(args) => daemon::link(&client, args).await,
        Commands::Stop => daemon::stop(paths).await,
    }
}

fn into_cli_error(err: anyhow::Error, paths: &Paths) -> CliError {
    let err = match err.downcast::<CliError>() {
        Ok(cli) => return cli,
        Err(err) => err,
    };
    match err.downcast::<ClientError>() {
        Ok(client) => CliError::from_client(client, paths),
        Err(other) => CliError::new(format!("{:#}", other)),
    }
}
