// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation executor
//!
//! Turns one queued operation into one remote call and classifies what came
//! back. It never touches the store; the coordinator applies outcomes.

use agsync_adapters::{RemoteAuthority, RemoteError, RemoteRequest, RemoteResponse};
use agsync_core::{QueuedOperation, RemoteOutcome};
use std::time::Duration;

/// Longest slice of a response body kept in a failure reason
const MAX_REASON_BODY: usize = 200;

#[derive(Clone)]
pub struct Executor<R> {
    remote: R,
    timeout: Duration,
}

impl<R: RemoteAuthority> Executor<R> {
    pub fn new(remote: R, timeout: Duration) -> Self {
        Self { remote, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One bounded attempt, carrying the operation id as idempotency token
    pub async fn execute(&self, op: &QueuedOperation) -> RemoteOutcome {
        let request = RemoteRequest::from_operation(op);
        match tokio::time::timeout(self.timeout, self.remote.send(&request)).await {
            Ok(result) => classify(result, &request.idempotency_token),
            Err(_) => RemoteOutcome::transient(format!("timed out after {:?}", self.timeout)),
        }
    }
}

/// Map a remote result onto applied / rejected / transient
///
/// 2xx applies; 408, 429 and 5xx are worth retrying; every other status is
/// a permanent refusal. Errors that never produced a status are transient,
/// except a request that could not even be built.
pub fn classify(result: Result<RemoteResponse, RemoteError>, token: &str) -> RemoteOutcome {
    match result {
        Ok(response) if response.is_success() => {
            RemoteOutcome::applied(response.remote_id.unwrap_or_else(|| token.to_string()))
        }
        Ok(response) => {
            let reason = describe(&response);
            match response.status {
                408 | 429 | 500..=599 => RemoteOutcome::transient(reason),
                _ => RemoteOutcome::rejected(reason),
            }
        }
        Err(RemoteError::InvalidRequest(reason)) => RemoteOutcome::rejected(reason),
        Err(e) => RemoteOutcome::transient(e.to_string()),
    }
}

fn describe(response: &RemoteResponse) -> String {
    let body = response.body.trim();
    if body.is_empty() {
        return format!("status {}", response.status);
    }
    let mut snippet: String = body.chars().take(MAX_REASON_BODY).collect();
    if body.chars().count() > MAX_REASON_BODY {
        snippet.push_str("...");
    }
    format!("status {}: {}", response.status, snippet)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
