// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agsync_core::OperationKind;
use chrono::{TimeZone, Utc};
use serde_json::json;

fn op(id: &str, secs: i64) -> QueuedOperation {
    QueuedOperation::new(
        id,
        OperationKind::CreateRecord,
        "farm",
        json!({ "recordId": "farm-7" }),
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    )
}

fn append(state: &mut QueueState, id: &str, secs: i64, seq: u64) {
    state
        .apply(&StoreOp::Append { operation: op(id, secs) }, seq)
        .unwrap();
}

fn claim(id: &str) -> StoreOp {
    StoreOp::Claim { id: id.to_string() }
}

fn failed(id: &str, permanent: bool) -> StoreOp {
    StoreOp::Failed {
        id: id.to_string(),
        error: "boom".to_string(),
        permanent,
        at: Utc.timestamp_opt(1_800_000_000, 0).unwrap(),
    }
}

#[test]
fn append_inserts_pending() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    assert_eq!(state.get("a").unwrap().state, OperationState::Pending);
    assert_eq!(state.counts().pending, 1);
}

#[test]
fn duplicate_append_is_rejected() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    let err = state
        .apply(&StoreOp::Append { operation: op("a", 1) }, 1)
        .unwrap_err();
    assert_eq!(err, ApplyError::AlreadyExists("a".to_string()));
}

#[test]
fn ordering_uses_submission_time_then_sequence() {
    let mut state = QueueState::new();
    append(&mut state, "late", 10, 0);
    append(&mut state, "tie-b", 5, 1);
    append(&mut state, "tie-a", 5, 2);

    let ids: Vec<_> = state
        .in_states(&[OperationState::Pending])
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec!["tie-b", "tie-a", "late"]);
}

#[test]
fn applied_prunes_record() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    state.apply(&claim("a"), 1).unwrap();
    state
        .apply(&StoreOp::Applied { id: "a".to_string() }, 2)
        .unwrap();
    assert!(state.is_empty());
}

#[test]
fn transient_failure_returns_to_pending_with_attempt() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    state.apply(&claim("a"), 1).unwrap();
    state.apply(&failed("a", false), 2).unwrap();

    let record = state.get("a").unwrap();
    assert_eq!(record.state, OperationState::Pending);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.last_error.as_deref(), Some("boom"));
    assert!(record.dead_lettered_at.is_none());
}

#[test]
fn permanent_failure_dead_letters() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    state.apply(&claim("a"), 1).unwrap();
    state.apply(&failed("a", true), 2).unwrap();

    let record = state.get("a").unwrap();
    assert_eq!(record.state, OperationState::DeadLettered);
    assert!(record.dead_lettered_at.is_some());
    assert_eq!(state.counts().dead_lettered, 1);
}

#[test]
fn requeue_resets_attempts() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    state.apply(&claim("a"), 1).unwrap();
    state.apply(&failed("a", true), 2).unwrap();
    state
        .apply(&StoreOp::Requeue { id: "a".to_string() }, 3)
        .unwrap();

    let record = state.get("a").unwrap();
    assert_eq!(record.state, OperationState::Pending);
    assert_eq!(record.attempts, 0);
    assert!(record.last_error.is_none());
}

#[test]
fn recovered_counts_the_lost_attempt() {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    state.apply(&claim("a"), 1).unwrap();
    assert_eq!(state.in_flight_ids(), vec!["a".to_string()]);

    state
        .apply(&StoreOp::Recovered { id: "a".to_string() }, 2)
        .unwrap();
    let record = state.get("a").unwrap();
    assert_eq!(record.state, OperationState::Pending);
    assert_eq!(record.attempts, 1);
}

#[yare::parameterized(
    claim_in_flight = { true, StoreOp::Claim { id: "a".to_string() }, OperationState::InFlight },
    applied_pending = { false, StoreOp::Applied { id: "a".to_string() }, OperationState::Pending },
    requeue_pending = { false, StoreOp::Requeue { id: "a".to_string() }, OperationState::Pending },
    recover_pending = { false, StoreOp::Recovered { id: "a".to_string() }, OperationState::Pending },
)]
fn invalid_transitions_leave_state_untouched(
    claimed: bool,
    store_op: StoreOp,
    current: OperationState,
) {
    let mut state = QueueState::new();
    append(&mut state, "a", 0, 0);
    if claimed {
        state.apply(&claim("a"), 1).unwrap();
    }
    let before = state.clone();

    let err = state.apply(&store_op, 9).unwrap_err();
    assert!(matches!(err, ApplyError::InvalidTransition { state, .. } if state == current));
    assert_eq!(state, before);
}

#[test]
fn unknown_id_is_not_found() {
    let state = QueueState::new();
    assert_eq!(
        state.check(&claim("ghost")),
        Err(ApplyError::NotFound("ghost".to_string()))
    );
}
