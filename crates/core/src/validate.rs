// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload schema checks applied before anything is queued

use crate::operation::OperationKind;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target type must not be empty")]
    EmptyTargetType,
    #[error("{kind} payload must be a JSON object")]
    NotAnObject { kind: OperationKind },
    #[error("append-telemetry payload must be an object or a non-empty array of objects")]
    InvalidTelemetry,
    #[error("{kind} payload requires a non-empty `recordId`")]
    MissingRecordId { kind: OperationKind },
    #[error("issue-command payload requires a non-empty string `command`")]
    MissingCommand,
}

/// Check that a submission is well formed for its kind
pub fn validate_submission(
    kind: OperationKind,
    target_type: &str,
    payload: &Value,
) -> Result<(), ValidationError> {
    if target_type.trim().is_empty() {
        return Err(ValidationError::EmptyTargetType);
    }

    match kind {
        OperationKind::AppendTelemetry => match payload {
            Value::Object(_) => Ok(()),
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
                Ok(())
            }
            _ => Err(ValidationError::InvalidTelemetry),
        },
        OperationKind::IssueCommand => {
            let obj = payload
                .as_object()
                .ok_or(ValidationError::NotAnObject { kind })?;
            match obj.get("command").and_then(Value::as_str) {
                Some(cmd) if !cmd.trim().is_empty() => Ok(()),
                _ => Err(ValidationError::MissingCommand),
            }
        }
        OperationKind::CreateRecord
        | OperationKind::UpdateRecord
        | OperationKind::DeleteRecord => {
            let obj = payload
                .as_object()
                .ok_or(ValidationError::NotAnObject { kind })?;
            if kind.requires_record_id() {
                match obj.get("recordId").and_then(Value::as_str) {
                    Some(id) if !id.trim().is_empty() => {}
                    _ => return Err(ValidationError::MissingRecordId { kind }),
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
