// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agsync_adapters::{FakeProbe, FakeRemote, FakeReply};
use agsync_core::{FakeClock, OperationKind};
use agsync_storage::StoreConfig;
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<OperationStore>,
    remote: FakeRemote,
    monitor: ConnectivityMonitor<FakeProbe>,
    clock: FakeClock,
    coordinator: SyncCoordinator<FakeRemote, FakeProbe, FakeClock>,
    next: std::cell::Cell<u32>,
}

fn policy(max_attempts: u32, base_secs: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_secs(base_secs),
        max_delay: Duration::from_secs(300),
    }
}

fn harness_with(policy: RetryPolicy, timeout: Duration) -> Harness {
    harness_config(policy, timeout, CoordinatorConfig::default())
}

fn harness_config(policy: RetryPolicy, timeout: Duration, config: CoordinatorConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(OperationStore::open(dir.path(), StoreConfig::default()).unwrap());
    let remote = FakeRemote::new();
    let monitor = ConnectivityMonitor::new(FakeProbe::new(true), 1);
    let clock = FakeClock::new();
    let coordinator = SyncCoordinator::new(
        store.clone(),
        Executor::new(remote.clone(), timeout),
        monitor.clone(),
        clock.clone(),
        policy,
        config,
    );
    Harness {
        _dir: dir,
        store,
        remote,
        monitor,
        clock,
        coordinator,
        next: std::cell::Cell::new(0),
    }
}

fn harness() -> Harness {
    harness_with(policy(5, 2), Duration::from_secs(5))
}

impl Harness {
    /// Queue an operation directly in the store
    fn queue(&self, kind: OperationKind, target: &str, payload: serde_json::Value) -> String {
        let n = self.next.get() + 1;
        self.next.set(n);
        let id = format!("op-{}", n);
        let submitted = self.clock.utc_now() + chrono::Duration::milliseconds(n as i64);
        self.store
            .append(QueuedOperation::new(&id, kind, target, payload, submitted))
            .unwrap()
    }

    fn go_online(&self) {
        self.monitor.record_probe(Ok(()));
    }

    fn state_of(&self, id: &str) -> Option<OperationState> {
        self.store.get(id).map(|op| op.state)
    }
}

#[tokio::test]
async fn entity_operations_apply_in_submission_order() {
    let h = harness();
    let create = h.queue(
        OperationKind::CreateRecord,
        "farm",
        json!({ "recordId": "farm-7", "acres": 10 }),
    );
    let first = h.queue(
        OperationKind::UpdateRecord,
        "farm",
        json!({ "recordId": "farm-7", "acres": 12 }),
    );
    let second = h.queue(
        OperationKind::UpdateRecord,
        "farm",
        json!({ "recordId": "farm-7", "acres": 15 }),
    );

    // Offline: nothing happens
    assert_eq!(h.coordinator.drain_once().await, DrainReport::default());
    assert!(h.remote.calls().is_empty());

    h.go_online();
    let report = h.coordinator.drain_once().await;
    assert_eq!(report.applied, 3);
    assert_eq!(h.remote.effects(), vec![create, first, second]);
    assert_eq!(h.remote.record("farm", "farm-7").unwrap()["acres"], 15);
    assert_eq!(h.store.counts().live(), 0);
}

#[tokio::test]
async fn transient_failure_waits_out_backoff() {
    let h = harness();
    h.go_online();
    let id = h.queue(OperationKind::CreateRecord, "harvest", json!({ "kg": 3 }));
    h.remote.push_reply(FakeReply::Status(503, String::new()));

    let report = h.coordinator.drain_once().await;
    assert_eq!(report.retried, 1);
    let op = h.store.get(&id).unwrap();
    assert_eq!(op.state, OperationState::Pending);
    assert_eq!(op.attempts, 1);
    assert_eq!(op.last_error.as_deref(), Some("status 503"));

    // Not due yet
    let report = h.coordinator.drain_once().await;
    assert_eq!(report.skipped, 1);
    assert_eq!(h.remote.calls().len(), 1);

    h.clock.advance(Duration::from_secs(5));
    let report = h.coordinator.drain_once().await;
    assert_eq!(report.applied, 1);
    assert!(h.store.get(&id).is_none());
}

#[tokio::test]
async fn first_retry_delay_is_within_base_and_double_base() {
    let h = harness();
    h.go_online();
    let id = h.queue(OperationKind::CreateRecord, "harvest", json!({}));
    h.remote.push_reply(FakeReply::Status(500, String::new()));

    let before = h.clock.now();
    h.coordinator.drain_once().await;
    let deadline = h.coordinator.retry_deadline(&id).unwrap();
    let delay = deadline - before;
    assert!(delay >= Duration::from_secs(2) && delay < Duration::from_secs(4));
}

#[tokio::test]
async fn exhausted_retries_dead_letter() {
    let h = harness_with(policy(2, 0), Duration::from_secs(5));
    h.go_online();
    let id = h.queue(OperationKind::AppendTelemetry, "sensor-reading", json!({ "t": 1 }));
    h.remote.push_reply(FakeReply::Status(503, String::new()));
    h.remote.push_reply(FakeReply::Status(503, String::new()));

    assert_eq!(h.coordinator.drain_once().await.retried, 1);
    assert_eq!(h.coordinator.drain_once().await.dead_lettered, 1);

    let dead = h.store.get(&id).unwrap();
    assert_eq!(dead.state, OperationState::DeadLettered);
    assert_eq!(dead.attempts, 2);
    assert!(dead
        .last_error
        .unwrap()
        .starts_with("gave up after 2 attempts"));
}

#[tokio::test]
async fn rejected_operation_is_never_retried_automatically() {
    let h = harness();
    h.go_online();
    let mut events = h.coordinator.subscribe_events();
    let id = h.queue(OperationKind::CreateRecord, "farm", json!({ "name": "" }));
    h.remote
        .push_reply(FakeReply::Status(422, "name required".to_string()));

    let report = h.coordinator.drain_once().await;
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(h.state_of(&id), Some(OperationState::DeadLettered));

    match events.recv().await.unwrap() {
        SyncEvent::DeadLettered { id: dead, reason } => {
            assert_eq!(dead, id);
            assert_eq!(reason, "status 422: name required");
        }
        other => panic!("unexpected event {:?}", other),
    }

    h.clock.advance(Duration::from_secs(600));
    h.coordinator.drain_once().await;
    assert_eq!(h.remote.calls().len(), 1);
}

#[tokio::test]
async fn failed_head_blocks_its_entity_only() {
    let h = harness();
    h.go_online();
    let blocked_head = h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-7" }));
    let blocked_tail = h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-7" }));
    let other = h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-8" }));
    h.remote
        .push_reply_for(&blocked_head, FakeReply::Status(503, String::new()));

    let report = h.coordinator.drain_once().await;
    assert_eq!(report.applied, 1);
    assert_eq!(report.retried, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.remote.effects(), vec![other]);
    assert_eq!(h.state_of(&blocked_tail), Some(OperationState::Pending));

    h.clock.advance(Duration::from_secs(10));
    h.coordinator.drain_once().await;
    assert_eq!(
        h.remote.effects()[1..].to_vec(),
        vec![blocked_head, blocked_tail]
    );
}

#[tokio::test]
async fn backed_off_entity_does_not_crowd_out_others() {
    let config = CoordinatorConfig {
        batch_size: 2,
        ..CoordinatorConfig::default()
    };
    let h = harness_config(policy(5, 2), Duration::from_secs(5), config);
    h.go_online();
    let head = h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-1" }));
    h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-1" }));
    let other = h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-2" }));
    h.remote.push_reply_for(&head, FakeReply::Status(503, String::new()));

    let first = h.coordinator.drain_once().await;
    assert_eq!(first.retried, 1);
    assert_eq!(first.skipped, 2);

    // farm-1 is waiting out its backoff; farm-2 still gets its turn
    let second = h.coordinator.drain_once().await;
    assert_eq!(second.applied, 1);
    assert_eq!(second.skipped, 2);
    assert_eq!(h.remote.effects(), vec![other]);
}

#[tokio::test(start_paused = true)]
async fn outcome_that_cannot_be_stored_is_not_announced() {
    let h = harness_with(policy(5, 0), Duration::from_secs(5));
    h.go_online();
    let id = h.queue(OperationKind::CreateRecord, "farm", json!({ "recordId": "farm-3" }));
    let mut events = h.coordinator.subscribe_events();
    h.remote.set_delay(Some(Duration::from_secs(1)));

    let coordinator = h.coordinator.clone();
    let pass = tokio::spawn(async move { coordinator.drain_once().await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    // The claim is reverted underneath the worker, so recording success fails
    assert_eq!(h.store.recover_in_flight().unwrap(), vec![id.clone()]);

    let report = pass.await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.applied, 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        SyncEvent::DrainCompleted(_)
    ));

    h.remote.set_delay(None);
    assert_eq!(h.coordinator.drain_once().await.applied, 1);
    assert_eq!(h.remote.effects(), vec![id]);
}

#[tokio::test(start_paused = true)]
async fn offline_mid_drain_reverts_claim_without_duplicates() {
    let h = harness_with(policy(5, 0), Duration::from_secs(2));
    h.go_online();
    let id = h.queue(OperationKind::CreateRecord, "farm", json!({ "recordId": "farm-9" }));
    let follower = h.queue(OperationKind::UpdateRecord, "farm", json!({ "recordId": "farm-9" }));
    // The remote applies the write but the response never arrives in time
    h.remote.set_delay(Some(Duration::from_secs(60)));

    let coordinator = h.coordinator.clone();
    let pass = tokio::spawn(async move { coordinator.drain_once().await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.state_of(&id), Some(OperationState::InFlight));
    h.monitor.report_link(false);

    let report = pass.await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.state_of(&id), Some(OperationState::Pending));
    assert_eq!(h.state_of(&follower), Some(OperationState::Pending));

    // Offline: nothing further is attempted
    assert_eq!(h.coordinator.drain_once().await.attempted, 0);

    h.remote.set_delay(None);
    h.monitor.report_link(true);
    let report = h.coordinator.drain_once().await;
    assert_eq!(report.applied, 2);
    assert_eq!(h.remote.calls().len(), 3);
    assert_eq!(h.remote.effects(), vec![id, follower]);
}

#[tokio::test]
async fn lost_response_is_retried_without_duplicate() {
    let h = harness_with(policy(5, 0), Duration::from_secs(5));
    h.go_online();
    let id = h.queue(OperationKind::IssueCommand, "irrigation-command", json!({ "command": "open" }));
    h.remote.push_reply(FakeReply::LoseResponse);

    assert_eq!(h.coordinator.drain_once().await.retried, 1);
    assert_eq!(h.coordinator.drain_once().await.applied, 1);

    let calls = h.remote.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.token == id));
    assert_eq!(h.remote.effects().len(), 1);
}

#[tokio::test]
async fn crash_between_claim_and_outcome_recovers() {
    let dir = TempDir::new().unwrap();
    let remote = FakeRemote::new();
    let id = {
        let store = OperationStore::open(dir.path(), StoreConfig::default()).unwrap();
        let op = QueuedOperation::new(
            "op-crash",
            OperationKind::CreateRecord,
            "farm",
            json!({ "recordId": "farm-1" }),
            chrono::Utc::now(),
        );
        store.append(op).unwrap();
        store.mark_in_flight("op-crash").unwrap();
        // The request went out and landed before the crash
        let request = agsync_adapters::RemoteRequest::from_operation(&store.get("op-crash").unwrap());
        agsync_adapters::RemoteAuthority::send(&remote, &request)
            .await
            .unwrap();
        "op-crash".to_string()
    };

    let store = Arc::new(OperationStore::open(dir.path(), StoreConfig::default()).unwrap());
    assert_eq!(store.recover_in_flight().unwrap(), vec![id.clone()]);

    let monitor = ConnectivityMonitor::new(FakeProbe::new(true), 1);
    monitor.record_probe(Ok(()));
    let coordinator = SyncCoordinator::new(
        store.clone(),
        Executor::new(remote.clone(), Duration::from_secs(5)),
        monitor,
        FakeClock::new(),
        policy(5, 2),
        CoordinatorConfig::default(),
    );

    // Recovered operations are immediately eligible
    assert_eq!(coordinator.drain_once().await.applied, 1);
    assert!(store.get(&id).is_none());
    assert_eq!(remote.calls().len(), 2);
    assert_eq!(remote.effects(), vec![id]);
}

#[tokio::test]
async fn full_drain_records_last_success() {
    let h = harness();
    assert!(h.coordinator.last_successful_sync_at().is_none());

    h.go_online();
    h.queue(OperationKind::CreateRecord, "farm", json!({}));
    h.coordinator.drain_once().await;
    let first = h.coordinator.last_successful_sync_at().unwrap();
    assert!(!h.coordinator.sync_in_progress());

    // A pass that leaves work behind does not count
    h.clock.advance(Duration::from_secs(60));
    h.queue(OperationKind::CreateRecord, "farm", json!({}));
    h.remote.push_reply(FakeReply::Status(503, String::new()));
    h.coordinator.drain_once().await;
    assert_eq!(h.coordinator.last_successful_sync_at(), Some(first));
}

#[tokio::test]
async fn concurrency_limit_still_drains_every_lane() {
    let h = harness();
    h.go_online();
    for i in 0..20 {
        h.queue(
            OperationKind::UpdateRecord,
            "sensor",
            json!({ "recordId": format!("s-{}", i % 7) }),
        );
    }

    let report = h.coordinator.drain_once().await;
    assert_eq!(report.applied, 20);
    assert_eq!(h.remote.effects().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn run_loop_drains_when_coming_online() {
    let h = harness();
    let id = h.queue(OperationKind::CreateRecord, "farm", json!({ "recordId": "f-2" }));
    let mut events = h.coordinator.subscribe_events();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let coordinator = h.coordinator.clone();
    let handle = tokio::spawn(async move { coordinator.run(shutdown_rx).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.state_of(&id), Some(OperationState::Pending));

    h.go_online();
    let applied = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(SyncEvent::Applied { id, .. }) = events.recv().await {
                return id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(applied, id);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn run_loop_drains_on_trigger() {
    let h = harness();
    h.go_online();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator = h.coordinator.clone();
    let handle = tokio::spawn(async move { coordinator.run(shutdown_rx).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let id = h.queue(OperationKind::CreateRecord, "farm", json!({}));
    h.coordinator.trigger();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.store.get(&id).is_none());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

fn op_for(n: usize, record: u8) -> QueuedOperation {
    QueuedOperation::new(
        format!("op-{}", n),
        OperationKind::UpdateRecord,
        "farm",
        json!({ "recordId": format!("r-{}", record) }),
        chrono::Utc::now(),
    )
}

proptest! {
    #[test]
    fn lanes_preserve_submission_order(records in proptest::collection::vec(0u8..5, 0..40)) {
        let ops: Vec<_> = records.iter().enumerate().map(|(n, r)| op_for(n, *r)).collect();
        let lanes = group_lanes(ops.clone());

        prop_assert_eq!(lanes.iter().map(Vec::len).sum::<usize>(), ops.len());
        for lane in &lanes {
            let key = lane[0].entity_key();
            prop_assert!(lane.iter().all(|op| op.entity_key() == key));
            let positions: Vec<_> = lane
                .iter()
                .map(|op| ops.iter().position(|o| o.id == op.id).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
