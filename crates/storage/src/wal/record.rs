// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State changes recorded in the WAL

use agsync_core::QueuedOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One durable state change to the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    /// New record in Pending state
    Append { operation: QueuedOperation },
    /// Pending -> InFlight
    Claim { id: String },
    /// InFlight -> Applied (record pruned)
    Applied { id: String },
    /// InFlight -> Pending (retry) or DeadLettered, attempts incremented
    Failed {
        id: String,
        error: String,
        permanent: bool,
        at: DateTime<Utc>,
    },
    /// DeadLettered -> Pending, attempts reset by operator action
    Requeue { id: String },
    /// InFlight found on startup -> Pending, attempts incremented
    Recovered { id: String },
}

impl StoreOp {
    pub fn name(&self) -> &'static str {
        match self {
            StoreOp::Append { .. } => "append",
            StoreOp::Claim { .. } => "claim",
            StoreOp::Applied { .. } => "applied",
            StoreOp::Failed { .. } => "failed",
            StoreOp::Requeue { .. } => "requeue",
            StoreOp::Recovered { .. } => "recovered",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            StoreOp::Append { operation } => &operation.id,
            StoreOp::Claim { id }
            | StoreOp::Applied { id }
            | StoreOp::Failed { id, .. }
            | StoreOp::Requeue { id }
            | StoreOp::Recovered { id } => id,
        }
    }
}
