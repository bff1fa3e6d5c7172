// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized queue state from snapshot + WAL replay

use crate::wal::StoreOp;
use agsync_core::{OperationState, QueueCounts, QueuedOperation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from applying an op to the queue state
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("operation not found: {0}")]
    NotFound(String),
    #[error("operation already exists: {0}")]
    AlreadyExists(String),
    #[error("cannot {op} operation {id} in state {state}")]
    InvalidTransition {
        id: String,
        op: &'static str,
        state: OperationState,
    },
}

/// A live record plus the WAL sequence that appended it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub seq: u64,
    pub operation: QueuedOperation,
}

/// Every live (non-Applied) operation keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    records: BTreeMap<String, Slot>,
}

const RECOVERED_ERROR: &str = "interrupted before outcome was recorded";

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&QueuedOperation> {
        self.records.get(id).map(|slot| &slot.operation)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for slot in self.records.values() {
            match slot.operation.state {
                OperationState::Pending => counts.pending += 1,
                OperationState::InFlight => counts.in_flight += 1,
                OperationState::DeadLettered => counts.dead_lettered += 1,
                OperationState::Applied => {}
            }
        }
        counts
    }

    /// Records in the given states, oldest submission first
    ///
    /// Ties on `submitted_at` fall back to append order.
    pub fn in_states(&self, states: &[OperationState]) -> Vec<QueuedOperation> {
        let mut slots: Vec<&Slot> = self
            .records
            .values()
            .filter(|slot| states.contains(&slot.operation.state))
            .collect();
        slots.sort_by_key(|slot| (slot.operation.submitted_at, slot.seq));
        slots.into_iter().map(|s| s.operation.clone()).collect()
    }

    /// Ids currently InFlight
    pub fn in_flight_ids(&self) -> Vec<String> {
        self.in_states(&[OperationState::InFlight])
            .into_iter()
            .map(|op| op.id)
            .collect()
    }

    /// Check that `op` would apply cleanly, without mutating anything
    pub fn check(&self, op: &StoreOp) -> Result<(), ApplyError> {
        if let StoreOp::Append { operation } = op {
            if self.records.contains_key(&operation.id) {
                return Err(ApplyError::AlreadyExists(operation.id.clone()));
            }
            return Ok(());
        }

        let id = op.id();
        let current = self
            .get(id)
            .ok_or_else(|| ApplyError::NotFound(id.to_string()))?
            .state;
        let required = match op {
            StoreOp::Claim { .. } => OperationState::Pending,
            StoreOp::Requeue { .. } => OperationState::DeadLettered,
            _ => OperationState::InFlight,
        };
        if current != required {
            return Err(ApplyError::InvalidTransition {
                id: id.to_string(),
                op: op.name(),
                state: current,
            });
        }
        Ok(())
    }

    /// Apply a WAL op at sequence `seq`
    pub fn apply(&mut self, op: &StoreOp, seq: u64) -> Result<(), ApplyError> {
        self.check(op)?;

        match op {
            StoreOp::Append { operation } => {
                let mut operation = operation.clone();
                operation.state = OperationState::Pending;
                self.records
                    .insert(operation.id.clone(), Slot { seq, operation });
            }
            StoreOp::Claim { id } => {
                self.update(id, |record| record.state = OperationState::InFlight);
            }
            StoreOp::Applied { id } => {
                self.records.remove(id);
            }
            StoreOp::Failed {
                id,
                error,
                permanent,
                at,
            } => {
                self.update(id, |record| {
                    record.attempts += 1;
                    record.last_error = Some(error.clone());
                    if *permanent {
                        record.state = OperationState::DeadLettered;
                        record.dead_lettered_at = Some(*at);
                    } else {
                        record.state = OperationState::Pending;
                    }
                });
            }
            StoreOp::Requeue { id } => {
                self.update(id, |record| {
                    record.state = OperationState::Pending;
                    record.attempts = 0;
                    record.last_error = None;
                    record.dead_lettered_at = None;
                });
            }
            StoreOp::Recovered { id } => {
                self.update(id, |record| {
                    record.state = OperationState::Pending;
                    record.attempts += 1;
                    record.last_error = Some(RECOVERED_ERROR.to_string());
                });
            }
        }
        Ok(())
    }

    fn update(&mut self, id: &str, f: impl FnOnce(&mut QueuedOperation)) {
        if let Some(slot) = self.records.get_mut(id) {
            f(&mut slot.operation);
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
