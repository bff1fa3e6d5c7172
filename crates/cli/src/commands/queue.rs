// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue commands: submit, dead-letters, requeue

use agsync_core::OperationKind;
use anyhow::Result;
use clap::Args;

use crate::client::DaemonClient;
use crate::error::CliError;
use crate::output::{print_dead_letters, OutputFormat};

#[derive(Args)]
pub struct SubmitArgs {
    /// Operation kind (create-record, update-record, delete-record,
    /// append-telemetry, issue-command)
    #[arg(value_parser = parse_kind)]
    pub kind: OperationKind,
    /// Remote collection, e.g. farm or sensor-reading
    pub target_type: String,
    /// JSON payload
    pub payload: String,
}

#[derive(Args)]
pub struct RequeueArgs {
    /// Id of the dead-lettered operation
    pub id: String,
}

fn parse_kind(s: &str) -> Result<OperationKind, String> {
    s.parse::<OperationKind>().map_err(|e| {
        let known: Vec<_> = OperationKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("{} (expected one of: {})", e, known.join(", "))
    })
}

pub async fn submit(client: &DaemonClient, args: SubmitArgs, format: OutputFormat) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&args.payload).map_err(|e| CliError::invalid_payload(&e))?;

    let id = client.submit(args.kind, &args.target_type, payload).await?;
    match format {
        OutputFormat::Text => println!("Queued: {}", id),
        OutputFormat::Json => println!("{}", serde_json::json!({ "queued": true, "id": id })),
    }
    Ok(())
}

pub async fn dead_letters(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let operations = client.dead_letters().await?;
    print_dead_letters(&operations, format);
    Ok(())
}

pub async fn requeue(client: &DaemonClient, args: RequeueArgs) -> Result<()> {
    if client.requeue(&args.id).await? {
        println!("Requeued: {}", args.id);
        Ok(())
    } else {
        Err(CliError::new(format!("'{}' is not a failed operation", args.id))
            .with_suggestion("List failed operations: agsync dead-letters")
            .into())
    }
}
