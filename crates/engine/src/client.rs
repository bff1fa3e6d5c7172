// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client facade
//!
//! `submit` always appends locally first and then nudges the coordinator,
//! online or not. Callers never wait on the network.

use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::{DrainReport, SyncCoordinator, SyncEvent};
use crate::error::SyncError;
use agsync_adapters::{ReachabilityProbe, RemoteAuthority};
use agsync_core::{
    validate_submission, Clock, IdGen, OperationKind, QueuedOperation, SyncStatus,
};
use agsync_storage::OperationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Returned once an operation is durably queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    pub queued: bool,
    pub id: String,
}

pub struct SyncClient<R, P, C, I> {
    coordinator: SyncCoordinator<R, P, C>,
    clock: C,
    id_gen: I,
}

impl<R, P, C, I> Clone for SyncClient<R, P, C, I>
where
    C: Clone,
    I: Clone,
{
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            clock: self.clock.clone(),
            id_gen: self.id_gen.clone(),
        }
    }
}

impl<R, P, C, I> SyncClient<R, P, C, I>
where
    R: RemoteAuthority,
    P: ReachabilityProbe,
    C: Clock,
    I: IdGen,
{
    pub fn new(coordinator: SyncCoordinator<R, P, C>, clock: C, id_gen: I) -> Self {
        Self {
            coordinator,
            clock,
            id_gen,
        }
    }

    fn store(&self) -> &Arc<OperationStore> {
        self.coordinator.store()
    }

    pub fn monitor(&self) -> &ConnectivityMonitor<P> {
        self.coordinator.monitor()
    }

    pub fn coordinator(&self) -> &SyncCoordinator<R, P, C> {
        &self.coordinator
    }

    /// Validate, queue durably, then trigger a drain
    pub fn submit(
        &self,
        kind: OperationKind,
        target_type: &str,
        payload: serde_json::Value,
    ) -> Result<SubmitResult, SyncError> {
        validate_submission(kind, target_type, &payload)?;

        let op = QueuedOperation::new(
            self.id_gen.next_id(),
            kind,
            target_type,
            payload,
            self.clock.utc_now(),
        );
        let id = self.store().append(op)?;
        tracing::info!(op_id = %id, %kind, target_type, "operation queued");

        self.coordinator.trigger();
        Ok(SubmitResult { queued: true, id })
    }

    /// Recomputed from the store and monitor on every call
    pub fn status(&self) -> SyncStatus {
        SyncStatus::from_parts(
            self.monitor().is_online(),
            self.store().counts(),
            self.coordinator.last_successful_sync_at(),
            self.coordinator.sync_in_progress(),
        )
    }

    pub fn dead_letters(&self) -> Vec<QueuedOperation> {
        self.store().dead_letters()
    }

    /// Operator override: move a dead letter back to Pending and drain
    pub fn requeue_dead_letter(&self, id: &str) -> Result<bool, SyncError> {
        let requeued = self.store().requeue(id)?;
        if requeued {
            self.coordinator.forget_retry(id);
            tracing::info!(op_id = %id, "dead letter requeued");
            self.coordinator.trigger();
        }
        Ok(requeued)
    }

    /// Manual sync: probe right away, then trigger a drain
    ///
    /// Returns whether the monitor considers us online afterwards.
    pub async fn sync_now(&self) -> bool {
        let online = self.monitor().probe_now().await;
        self.coordinator.trigger();
        online
    }

    /// Manual sync that waits up to `wait` for the triggered pass to finish
    ///
    /// `None` when offline, or when the pass outlasts `wait` (it keeps
    /// running in the background).
    pub async fn sync_and_wait(&self, wait: Duration) -> Option<DrainReport> {
        let mut events = self.subscribe_events();
        // A pass already running predates the trigger; wait for the next one
        let mut passes = if self.coordinator.sync_in_progress() { 2 } else { 1 };
        if !self.sync_now().await {
            return None;
        }
        tokio::time::timeout(wait, async {
            loop {
                match events.recv().await {
                    Ok(SyncEvent::DrainCompleted(report)) => {
                        passes -= 1;
                        if passes == 0 {
                            return Some(report);
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.coordinator.subscribe_events()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
