// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake remote authority for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{RemoteAuthority, RemoteError, RemoteRequest, RemoteResponse};
use agsync_core::OperationKind;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub token: String,
    pub kind: OperationKind,
    pub target_type: String,
    pub record_id: Option<String>,
    pub payload: serde_json::Value,
}

/// How the fake answers one call
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// Apply the operation (once per token) and answer 2xx
    Apply,
    /// Answer with this status without applying anything
    Status(u16, String),
    /// Fail before reaching the remote
    Error(RemoteError),
    /// Apply the operation, then drop the response
    LoseResponse,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RemoteCall>,
    replies: VecDeque<FakeReply>,
    replies_for: HashMap<String, VecDeque<FakeReply>>,
    /// token -> remote id for every applied token
    applied: HashMap<String, String>,
    /// tokens in the order their effect landed
    effects: Vec<String>,
    records: BTreeMap<(String, String), serde_json::Value>,
    delay: Option<Duration>,
    next_remote_id: u64,
}

/// Remote authority that records calls and honors idempotency tokens
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a reply for the next call that has no token-specific reply
    pub fn push_reply(&self, reply: FakeReply) {
        self.lock().replies.push_back(reply);
    }

    /// Queue a reply for the next call carrying `token`
    pub fn push_reply_for(&self, token: &str, reply: FakeReply) {
        self.lock()
            .replies_for
            .entry(token.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Delay every response (after the effect is applied)
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Tokens whose effect landed, in order
    pub fn effects(&self) -> Vec<String> {
        self.lock().effects.clone()
    }

    /// Current remote copy of a record
    pub fn record(&self, target_type: &str, record_id: &str) -> Option<serde_json::Value> {
        self.lock()
            .records
            .get(&(target_type.to_string(), record_id.to_string()))
            .cloned()
    }

    fn apply(state: &mut FakeState, request: &RemoteRequest) -> RemoteResponse {
        if let Some(remote_id) = state.applied.get(&request.idempotency_token) {
            return RemoteResponse::new(200, format!("{{\"id\":\"{}\"}}", remote_id));
        }

        let remote_id = match &request.record_id {
            Some(id) => id.clone(),
            None => {
                state.next_remote_id += 1;
                format!("remote-{}", state.next_remote_id)
            }
        };
        let key = (request.target_type.clone(), remote_id.clone());
        let status = match request.kind {
            OperationKind::CreateRecord => {
                state.records.insert(key, request.payload.clone());
                201
            }
            OperationKind::UpdateRecord => {
                state.records.insert(key, request.payload.clone());
                200
            }
            OperationKind::DeleteRecord => {
                state.records.remove(&key);
                200
            }
            OperationKind::AppendTelemetry | OperationKind::IssueCommand => 202,
        };

        state
            .applied
            .insert(request.idempotency_token.clone(), remote_id.clone());
        state.effects.push(request.idempotency_token.clone());
        RemoteResponse::new(status, format!("{{\"id\":\"{}\"}}", remote_id))
    }
}

#[async_trait]
impl RemoteAuthority for FakeRemote {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let (result, delay) = {
            let mut state = self.lock();
            state.calls.push(RemoteCall {
                token: request.idempotency_token.clone(),
                kind: request.kind,
                target_type: request.target_type.clone(),
                record_id: request.record_id.clone(),
                payload: request.payload.clone(),
            });

            let reply = state
                .replies_for
                .get_mut(&request.idempotency_token)
                .and_then(VecDeque::pop_front)
                .or_else(|| state.replies.pop_front())
                .unwrap_or(FakeReply::Apply);

            let result = match reply {
                FakeReply::Apply => Ok(Self::apply(&mut state, request)),
                FakeReply::Status(status, body) => Ok(RemoteResponse::new(status, body)),
                FakeReply::Error(e) => Err(e),
                FakeReply::LoseResponse => {
                    Self::apply(&mut state, request);
                    Err(RemoteError::Transport("connection reset by peer".to_string()))
                }
            };
            (result, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
