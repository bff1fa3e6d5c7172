// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL-backed operation store with crash recovery
//!
//! All mutations take one mutex, write one fsync'd WAL entry, then update
//! the in-memory state. Reads are served from memory.

use crate::snapshot::{Snapshot, SnapshotError, SnapshotManager};
use crate::state::{ApplyError, QueueState};
use crate::wal::{StoreOp, WalReadError, WalReader, WalWriter};
use agsync_core::{OperationState, QueueCounts, QueuedOperation};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

const WAL_FILE: &str = "wal.jsonl";
const SNAPSHOT_DIR: &str = "snapshots";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAL read error: {0}")]
    WalRead(#[from] WalReadError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("storage full: {capacity} operations queued")]
    StorageFull { capacity: usize },
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum live (Pending, InFlight, DeadLettered) records
    pub capacity: usize,
    /// WAL entries between automatic snapshots; 0 disables them
    pub snapshot_interval: u64,
    /// Older snapshots retained besides the newest
    pub keep_old_snapshots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            snapshot_interval: 1000,
            keep_old_snapshots: 2,
        }
    }
}

struct Inner {
    writer: WalWriter,
    state: QueueState,
    ops_since_snapshot: u64,
}

/// Durable, ordered storage of queued operations
pub struct OperationStore {
    dir: PathBuf,
    config: StoreConfig,
    snapshots: SnapshotManager,
    inner: Mutex<Inner>,
}

impl OperationStore {
    /// Open or create a store in `dir`
    ///
    /// Loads the newest snapshot, replays the WAL after it, and truncates
    /// any torn tail so new appends are not hidden behind it.
    pub fn open(dir: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let wal_path = dir.join(WAL_FILE);
        let snapshots = SnapshotManager::new(&dir.join(SNAPSHOT_DIR));

        let (mut state, start) = match snapshots.latest()? {
            Some(snapshot) => (snapshot.state, snapshot.sequence + 1),
            None => (QueueState::new(), 0),
        };

        let mut replayed = 0u64;
        let mut iter = WalReader::open_or_empty(&wal_path).entries_from(start)?;
        let mut corrupted = false;
        for entry in iter.by_ref() {
            match entry {
                Ok(entry) => {
                    if let Err(e) = state.apply(&entry.op, entry.sequence) {
                        tracing::warn!(sequence = entry.sequence, error = %e, "skipping WAL entry");
                    }
                    replayed += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stopping WAL replay at corrupt entry");
                    corrupted = true;
                    break;
                }
            }
        }
        if corrupted {
            truncate(&wal_path, iter.last_valid_position())?;
        }

        let writer = WalWriter::open(&wal_path, start)?;
        tracing::info!(
            dir = %dir.display(),
            snapshot_sequence = start.checked_sub(1),
            replayed,
            live = state.len(),
            "operation store opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            snapshots,
            inner: Mutex::new(Inner {
                writer,
                state,
                ops_since_snapshot: replayed,
            }),
        })
    }

    /// Truncate a torn WAL tail in `dir`, returning the bytes removed
    pub fn repair(dir: &Path) -> Result<u64, StoreError> {
        let wal_path = dir.join(WAL_FILE);
        if !wal_path.exists() {
            return Ok(0);
        }
        let validation = WalReader::open_or_empty(&wal_path).validate()?;
        let len = std::fs::metadata(&wal_path)?.len();
        if validation.corruption.is_none() || validation.valid_bytes >= len {
            return Ok(0);
        }
        truncate(&wal_path, validation.valid_bytes)?;
        Ok(len - validation.valid_bytes)
    }

    /// Snapshot, compact, and release the store
    pub fn close(self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        self.snapshot_locked(&mut inner)?;
        tracing::info!(dir = %self.dir.display(), "operation store closed");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Insert a new Pending record
    pub fn append(&self, operation: QueuedOperation) -> Result<String, StoreError> {
        let mut inner = self.lock();
        if inner.state.len() >= self.config.capacity {
            return Err(StoreError::StorageFull {
                capacity: self.config.capacity,
            });
        }
        let id = operation.id.clone();
        self.commit(&mut inner, StoreOp::Append { operation })?;
        Ok(id)
    }

    /// Pending and InFlight records in submission order
    pub fn list_pending(&self, limit: usize) -> Vec<QueuedOperation> {
        let mut ops = self
            .lock()
            .state
            .in_states(&[OperationState::Pending, OperationState::InFlight]);
        ops.truncate(limit);
        ops
    }

    /// Claim a Pending record; false if it is missing or not Pending
    pub fn mark_in_flight(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.state.get(id) {
            Some(op) if op.state == OperationState::Pending => {}
            _ => return Ok(false),
        }
        self.commit(&mut inner, StoreOp::Claim { id: id.to_string() })?;
        Ok(true)
    }

    /// Record success; the record is pruned
    pub fn mark_applied(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        self.commit(&mut inner, StoreOp::Applied { id: id.to_string() })
    }

    /// Record a failed attempt (attempts + 1)
    ///
    /// Permanent failures dead-letter the record; others return it to Pending.
    pub fn mark_failed(&self, id: &str, error: &str, permanent: bool) -> Result<(), StoreError> {
        self.mark_failed_at(id, error, permanent, Utc::now())
    }

    pub fn mark_failed_at(
        &self,
        id: &str,
        error: &str,
        permanent: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        self.commit(
            &mut inner,
            StoreOp::Failed {
                id: id.to_string(),
                error: error.to_string(),
                permanent,
                at,
            },
        )
    }

    /// Dead-lettered records, oldest submission first
    pub fn dead_letters(&self) -> Vec<QueuedOperation> {
        self.lock().state.in_states(&[OperationState::DeadLettered])
    }

    /// Move a dead letter back to Pending with attempts reset
    ///
    /// Returns false if the record is missing or not dead-lettered.
    pub fn requeue(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.state.get(id) {
            Some(op) if op.state == OperationState::DeadLettered => {}
            _ => return Ok(false),
        }
        self.commit(&mut inner, StoreOp::Requeue { id: id.to_string() })?;
        Ok(true)
    }

    /// Revert every InFlight record to Pending, counting the lost attempt
    pub fn recover_in_flight(&self) -> Result<Vec<String>, StoreError> {
        let mut inner = self.lock();
        let ids = inner.state.in_flight_ids();
        for id in &ids {
            self.commit(&mut inner, StoreOp::Recovered { id: id.clone() })?;
        }
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "recovered in-flight operations");
        }
        Ok(ids)
    }

    pub fn get(&self, id: &str) -> Option<QueuedOperation> {
        self.lock().state.get(id).cloned()
    }

    pub fn counts(&self) -> QueueCounts {
        self.lock().state.counts()
    }

    /// Write a snapshot now and compact the WAL behind it
    pub fn snapshot(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        self.snapshot_locked(&mut inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate, persist, then apply a single op
    fn commit(&self, inner: &mut Inner, op: StoreOp) -> Result<(), StoreError> {
        inner.state.check(&op)?;
        let seq = inner.writer.append(op.clone())?;
        inner.state.apply(&op, seq)?;
        inner.ops_since_snapshot += 1;

        if self.config.snapshot_interval > 0
            && inner.ops_since_snapshot >= self.config.snapshot_interval
        {
            // The op is already durable; a failed snapshot only delays compaction
            if let Err(e) = self.snapshot_locked(inner) {
                tracing::warn!(error = %e, "snapshot failed");
            }
        }
        Ok(())
    }

    fn snapshot_locked(&self, inner: &mut Inner) -> Result<(), StoreError> {
        let Some(sequence) = inner.writer.last_sequence() else {
            return Ok(());
        };
        if inner.ops_since_snapshot == 0 && self.snapshots.list()?.first() == Some(&sequence) {
            return Ok(());
        }
        self.snapshots
            .write(&Snapshot::new(sequence, inner.state.clone()))?;
        inner.writer.compact(sequence)?;
        inner.ops_since_snapshot = 0;
        let pruned = self.snapshots.prune(self.config.keep_old_snapshots)?;
        tracing::debug!(sequence, pruned = pruned.len(), "snapshot written");
        Ok(())
    }
}

fn truncate(path: &Path, len: u64) -> Result<(), StoreError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    tracing::warn!(path = %path.display(), len, "WAL truncated at corruption point");
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
