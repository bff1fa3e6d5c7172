// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync coordinator
//!
//! ```text
//! Pending ──claim──▶ InFlight ──Applied──▶ (pruned)
//!    ▲                  │
//!    └──Transient───────┤ attempts < max
//!                       └──Rejected / attempts exhausted──▶ DeadLettered
//! ```
//!
//! A drain pass groups pending operations into per-entity lanes. Lanes run
//! concurrently (bounded by a semaphore); operations inside a lane run in
//! submission order and the lane stops at its first non-applied outcome.

use crate::connectivity::ConnectivityMonitor;
use crate::executor::Executor;
use crate::scheduler::RetryScheduler;
use agsync_adapters::{ReachabilityProbe, RemoteAuthority};
use agsync_core::{
    Clock, CoordinatorConfig, EntityKey, OperationState, QueuedOperation, RemoteOutcome,
    RetryPolicy,
};
use agsync_storage::OperationStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify, Semaphore};
use tokio::task::JoinSet;

const EVENT_CAPACITY: usize = 256;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Applied {
        id: String,
        remote_id: String,
    },
    Retrying {
        id: String,
        attempts: u32,
        delay: Duration,
    },
    DeadLettered {
        id: String,
        reason: String,
    },
    DrainCompleted(DrainReport),
}

/// What one drain pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub applied: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Operations not attempted (offline, waiting out a backoff, or behind
    /// a failed operation of the same entity)
    pub skipped: usize,
}

impl DrainReport {
    fn merge(&mut self, other: DrainReport) {
        self.attempted += other.attempted;
        self.applied += other.applied;
        self.retried += other.retried;
        self.dead_lettered += other.dead_lettered;
        self.skipped += other.skipped;
    }
}

#[derive(Default)]
struct Plan {
    lanes: Vec<Vec<QueuedOperation>>,
    /// Operations behind a head that cannot run yet
    waiting: usize,
    /// Runnable operations left for a later pass by the batch limit
    deferred: usize,
}

enum Step {
    Applied,
    Retrying,
    DeadLettered,
    Blocked,
    /// Attempted, but the outcome could not be persisted; the claim stays
    /// in place until crash recovery reverts it
    Unrecorded,
}

struct Shared<R, P, C> {
    store: Arc<OperationStore>,
    executor: Executor<R>,
    monitor: ConnectivityMonitor<P>,
    clock: C,
    policy: RetryPolicy,
    config: CoordinatorConfig,
    retries: Mutex<RetryScheduler>,
    events: broadcast::Sender<SyncEvent>,
    trigger: Notify,
    pass: tokio::sync::Mutex<()>,
    in_progress: AtomicBool,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

/// Drives queued operations to a terminal state
pub struct SyncCoordinator<R, P, C> {
    shared: Arc<Shared<R, P, C>>,
}

impl<R, P, C> Clone for SyncCoordinator<R, P, C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Clears the in-progress flag when a pass ends, however it ends
struct PassFlag<'a>(&'a AtomicBool);

impl<'a> PassFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for PassFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R, P, C> SyncCoordinator<R, P, C>
where
    R: RemoteAuthority,
    P: ReachabilityProbe,
    C: Clock,
{
    pub fn new(
        store: Arc<OperationStore>,
        executor: Executor<R>,
        monitor: ConnectivityMonitor<P>,
        clock: C,
        policy: RetryPolicy,
        config: CoordinatorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                store,
                executor,
                monitor,
                clock,
                policy,
                config,
                retries: Mutex::new(RetryScheduler::new()),
                events,
                trigger: Notify::new(),
                pass: tokio::sync::Mutex::new(()),
                in_progress: AtomicBool::new(false),
                last_success: Mutex::new(None),
            }),
        }
    }

    /// Ask for a drain pass; triggers during a pass coalesce into one more
    pub fn trigger(&self) {
        self.shared.trigger.notify_one();
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    pub fn sync_in_progress(&self) -> bool {
        self.shared.in_progress.load(Ordering::SeqCst)
    }

    pub fn last_successful_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_success()
    }

    pub fn monitor(&self) -> &ConnectivityMonitor<P> {
        &self.shared.monitor
    }

    pub fn store(&self) -> &Arc<OperationStore> {
        &self.shared.store
    }

    /// Drop any backoff held for `id`
    pub fn forget_retry(&self, id: &str) {
        self.shared.retries().cancel(id);
    }

    /// When `id` may next be attempted, if it is waiting out a backoff
    pub fn retry_deadline(&self, id: &str) -> Option<std::time::Instant> {
        self.shared.retries().deadline(id)
    }

    /// Run one drain pass
    pub async fn drain_once(&self) -> DrainReport {
        let shared = &self.shared;
        let _pass = shared.pass.lock().await;
        let _flag = PassFlag::raise(&shared.in_progress);

        if !shared.monitor.is_online() {
            tracing::debug!("offline, skipping drain");
            return DrainReport::default();
        }

        let plan = shared.plan();
        let lane_count = plan.lanes.len();

        let semaphore = Arc::new(Semaphore::new(shared.config.concurrency.max(1)));
        let mut set = JoinSet::new();
        for lane in plan.lanes {
            let shared = shared.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return DrainReport {
                        skipped: lane.len(),
                        ..DrainReport::default()
                    };
                };
                shared.run_lane(lane).await
            });
        }

        let mut report = DrainReport {
            skipped: plan.waiting + plan.deferred,
            ..DrainReport::default()
        };
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(lane_report) => report.merge(lane_report),
                Err(e) => tracing::error!(error = %e, "lane task failed"),
            }
        }

        let counts = shared.store.counts();
        if counts.pending == 0 && counts.in_flight == 0 {
            *shared.last_success() = Some(shared.clock.utc_now());
        }
        if plan.deferred > 0 && report.attempted > 0 {
            // Runnable work was left out of this batch
            self.trigger();
        }

        tracing::info!(
            lanes = lane_count,
            attempted = report.attempted,
            applied = report.applied,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            skipped = report.skipped,
            "drain pass complete"
        );
        let _ = shared.events.send(SyncEvent::DrainCompleted(report));
        report
    }

    /// Drain on every trigger until `shutdown` flips to true
    ///
    /// Triggers: offline→online, `trigger()`, the earliest retry deadline,
    /// and the periodic safety-net interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let shared = &self.shared;
        let mut online = shared.monitor.subscribe();
        let mut ticker = tokio::time::interval(shared.config.sync_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("sync coordinator started");
        loop {
            let retry_wait = shared.next_retry_wait();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*online.borrow_and_update() {
                        continue;
                    }
                    tracing::info!("back online, draining");
                }
                _ = shared.trigger.notified() => {}
                _ = ticker.tick() => {}
                _ = tokio::time::sleep(retry_wait.unwrap_or_default()), if retry_wait.is_some() => {}
            }
            self.drain_once().await;
        }
        tracing::info!("sync coordinator stopped");
    }
}

impl<R, P, C> Shared<R, P, C>
where
    R: RemoteAuthority,
    P: ReachabilityProbe,
    C: Clock,
{
    fn retries(&self) -> MutexGuard<'_, RetryScheduler> {
        self.retries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn last_success(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_success.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick this pass's lanes from every pending operation
    ///
    /// Entities whose head is in flight or waiting out a backoff are passed
    /// over so they cannot crowd other entities out of the batch.
    fn plan(&self) -> Plan {
        let now = self.clock.now();
        let mut plan = Plan::default();
        let mut budget = self.config.batch_size.max(1);
        let retries = self.retries();

        for mut lane in group_lanes(self.store.list_pending(usize::MAX)) {
            let Some(head) = lane.first() else { continue };
            if head.state == OperationState::InFlight || !retries.is_due(&head.id, now) {
                plan.waiting += lane.len();
                continue;
            }
            if lane.len() > budget {
                plan.deferred += lane.len() - budget;
                lane.truncate(budget);
            }
            if lane.is_empty() {
                continue;
            }
            budget -= lane.len();
            plan.lanes.push(lane);
        }
        plan
    }

    fn next_retry_wait(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.retries()
            .next_deadline(now)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    async fn run_lane(self: Arc<Self>, lane: Vec<QueuedOperation>) -> DrainReport {
        let mut report = DrainReport::default();
        let total = lane.len();

        for (i, op) in lane.iter().enumerate() {
            let step = self.step(op).await;
            match step {
                Step::Applied => {
                    report.attempted += 1;
                    report.applied += 1;
                    continue;
                }
                Step::Retrying => {
                    report.attempted += 1;
                    report.retried += 1;
                    report.skipped += total - i - 1;
                }
                Step::DeadLettered => {
                    report.attempted += 1;
                    report.dead_lettered += 1;
                    report.skipped += total - i - 1;
                }
                Step::Unrecorded => {
                    report.attempted += 1;
                    report.skipped += total - i - 1;
                }
                Step::Blocked => report.skipped += total - i,
            }
            break;
        }
        report
    }

    async fn step(&self, op: &QueuedOperation) -> Step {
        if !self.monitor.is_online() {
            return Step::Blocked;
        }
        if op.state == OperationState::InFlight {
            return Step::Blocked;
        }
        if !self.retries().is_due(&op.id, self.clock.now()) {
            return Step::Blocked;
        }
        match self.store.mark_in_flight(&op.id) {
            Ok(true) => {}
            Ok(false) => return Step::Blocked,
            Err(e) => {
                tracing::error!(op_id = %op.id, error = %e, "claim failed");
                return Step::Blocked;
            }
        }

        let outcome = self.executor.execute(op).await;
        self.record(op, outcome)
    }

    fn record(&self, op: &QueuedOperation, outcome: RemoteOutcome) -> Step {
        match outcome {
            RemoteOutcome::Applied { remote_id } => {
                if let Err(e) = self.store.mark_applied(&op.id) {
                    tracing::error!(op_id = %op.id, error = %e, "failed to record success");
                    return Step::Unrecorded;
                }
                self.retries().cancel(&op.id);
                tracing::info!(
                    op_id = %op.id,
                    target_type = %op.target_type,
                    remote_id = %remote_id,
                    "operation applied"
                );
                let _ = self.events.send(SyncEvent::Applied {
                    id: op.id.clone(),
                    remote_id,
                });
                Step::Applied
            }
            RemoteOutcome::Rejected { reason } => self.dead_letter(op, reason),
            RemoteOutcome::TransientFailure { reason } => {
                let attempts = op.attempts + 1;
                if self.policy.exhausted(attempts) {
                    return self.dead_letter(
                        op,
                        format!("gave up after {} attempts: {}", attempts, reason),
                    );
                }

                let delay = self.policy.next_delay(op.attempts);
                if let Err(e) =
                    self.store
                        .mark_failed_at(&op.id, &reason, false, self.clock.utc_now())
                {
                    tracing::error!(op_id = %op.id, error = %e, "failed to record retry");
                    return Step::Unrecorded;
                }
                self.retries().schedule(&op.id, delay, self.clock.now());
                tracing::warn!(
                    op_id = %op.id,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %reason,
                    "transient failure, will retry"
                );
                let _ = self.events.send(SyncEvent::Retrying {
                    id: op.id.clone(),
                    attempts,
                    delay,
                });
                Step::Retrying
            }
        }
    }

    fn dead_letter(&self, op: &QueuedOperation, reason: String) -> Step {
        if let Err(e) = self
            .store
            .mark_failed_at(&op.id, &reason, true, self.clock.utc_now())
        {
            tracing::error!(op_id = %op.id, error = %e, "failed to dead-letter");
            return Step::Unrecorded;
        }
        self.retries().cancel(&op.id);
        tracing::warn!(
            op_id = %op.id,
            target_type = %op.target_type,
            error = %reason,
            "operation dead-lettered"
        );
        let _ = self.events.send(SyncEvent::DeadLettered {
            id: op.id.clone(),
            reason,
        });
        Step::DeadLettered
    }
}

/// Group operations by entity, keeping submission order inside each lane
fn group_lanes(ops: Vec<QueuedOperation>) -> Vec<Vec<QueuedOperation>> {
    let mut index: HashMap<EntityKey, usize> = HashMap::new();
    let mut lanes: Vec<Vec<QueuedOperation>> = Vec::new();
    for op in ops {
        let key = op.entity_key();
        match index.get(&key) {
            Some(&i) => lanes[i].push(op),
            None => {
                index.insert(key, lanes.len());
                lanes.push(vec![op]);
            }
        }
    }
    lanes
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
