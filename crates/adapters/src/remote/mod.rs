// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote authority adapters

mod http;

pub use http::HttpRemote;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRemote, FakeReply, RemoteCall};

use agsync_core::{OperationKind, QueuedOperation};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that never produced an HTTP status
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// One attempt to apply an operation at the remote authority
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
    /// Sent on every attempt; the remote authority ignores repeats
    pub idempotency_token: String,
    pub target_type: String,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
    #[serde(skip)]
    pub record_id: Option<String>,
}

impl RemoteRequest {
    pub fn from_operation(op: &QueuedOperation) -> Self {
        Self {
            idempotency_token: op.id.clone(),
            target_type: op.target_type.clone(),
            kind: op.kind,
            payload: op.payload.clone(),
            record_id: op.record_id().map(str::to_string),
        }
    }
}

/// Whatever status and body the remote authority answered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    /// Remote record id from a `{"id": ...}` body, if present
    pub remote_id: Option<String>,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status,
            remote_id: parse_remote_id(&body),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn parse_remote_id(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The system of record operations are applied to
#[async_trait]
pub trait RemoteAuthority: Clone + Send + Sync + 'static {
    /// Send one request; any HTTP status is an `Ok` response
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
