// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queued operations and their lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The mutation a queued operation asks the remote authority to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    CreateRecord,
    UpdateRecord,
    DeleteRecord,
    AppendTelemetry,
    IssueCommand,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::CreateRecord,
        OperationKind::UpdateRecord,
        OperationKind::DeleteRecord,
        OperationKind::AppendTelemetry,
        OperationKind::IssueCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateRecord => "create-record",
            OperationKind::UpdateRecord => "update-record",
            OperationKind::DeleteRecord => "delete-record",
            OperationKind::AppendTelemetry => "append-telemetry",
            OperationKind::IssueCommand => "issue-command",
        }
    }

    /// Kinds that address an existing remote record by id
    pub fn requires_record_id(&self) -> bool {
        matches!(
            self,
            OperationKind::UpdateRecord | OperationKind::DeleteRecord
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown operation kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for OperationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Lifecycle state of a queued operation
///
/// `Pending <-> InFlight` may cycle on retry; `Applied` and `DeadLettered`
/// are terminal except for an explicit operator requeue of a dead letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    InFlight,
    Applied,
    DeadLettered,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Pending => "pending",
            OperationState::InFlight => "in_flight",
            OperationState::Applied => "applied",
            OperationState::DeadLettered => "dead_lettered",
        };
        f.write_str(s)
    }
}

/// Identity of the remote entity an operation touches
///
/// Operations sharing a key are applied in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub target_type: String,
    pub record: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target_type, self.record)
    }
}

/// A mutation awaiting application at the remote authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// Assigned at enqueue; also the idempotency token
    pub id: String,
    pub kind: OperationKind,
    pub target_type: String,
    pub payload: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub state: OperationState,
    #[serde(default)]
    pub dead_lettered_at: Option<DateTime<Utc>>,
}

impl QueuedOperation {
    pub fn new(
        id: impl Into<String>,
        kind: OperationKind,
        target_type: impl Into<String>,
        payload: serde_json::Value,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            target_type: target_type.into(),
            payload,
            submitted_at,
            attempts: 0,
            last_error: None,
            state: OperationState::Pending,
            dead_lettered_at: None,
        }
    }

    /// Record id carried in the payload (`recordId`, falling back to `id`)
    pub fn record_id(&self) -> Option<&str> {
        let obj = self.payload.as_object()?;
        obj.get("recordId")
            .or_else(|| obj.get("id"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Ordering key; operations without a record id only order against themselves
    pub fn entity_key(&self) -> EntityKey {
        EntityKey {
            target_type: self.target_type.clone(),
            record: self
                .record_id()
                .map(str::to_string)
                .unwrap_or_else(|| format!("~{}", self.id)),
        }
    }
}

/// Result of a single executor attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoteOutcome {
    Applied { remote_id: String },
    Rejected { reason: String },
    TransientFailure { reason: String },
}

impl RemoteOutcome {
    pub fn applied(remote_id: impl Into<String>) -> Self {
        RemoteOutcome::Applied {
            remote_id: remote_id.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        RemoteOutcome::Rejected {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        RemoteOutcome::TransientFailure {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
