// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-facing commands: status, sync, link, stop

use agsync_daemon::Paths;
use anyhow::Result;
use clap::{Args, ValueEnum};

use crate::client::{daemon_stop, DaemonClient};
use crate::output::{print_status, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkState {
    Up,
    Down,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Whether the local network link is up
    pub state: LinkState,
}

pub async fn status(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;
    print_status(&status, format);
    Ok(())
}

pub async fn sync(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let status = client.sync_now().await?;
    print_status(&status, format);
    Ok(())
}

pub async fn link(client: &DaemonClient, args: LinkArgs) -> Result<()> {
    let up = args.state == LinkState::Up;
    client.report_link(up).await?;
    println!("Link reported {}", if up { "up" } else { "down" });
    Ok(())
}

pub async fn stop(paths: &Paths) -> Result<()> {
    if daemon_stop(paths).await? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}
