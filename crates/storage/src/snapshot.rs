// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot management for WAL compaction
//!
//! A snapshot captures the queue state as of a WAL sequence. Files are
//! written to a temp path and renamed, so a reader never sees a partial one.

use crate::state::QueueState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid snapshot format: {0}")]
    InvalidFormat(String),
}

/// Queue state as of `sequence` (inclusive)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub state: QueueState,
}

impl Snapshot {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(sequence: u64, state: QueueState) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            sequence,
            created_at: Utc::now(),
            state,
        }
    }
}

/// Reads, writes and prunes `snapshot-<seq>.json` files
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Write a snapshot atomically, returning its path
    pub fn write(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(snapshot.sequence);
        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    pub fn load(&self, sequence: u64) -> Result<Snapshot, SnapshotError> {
        let file = File::open(self.path_for(sequence))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        if snapshot.version != Snapshot::CURRENT_VERSION {
            return Err(SnapshotError::InvalidFormat(format!(
                "unsupported version: {} (expected {})",
                snapshot.version,
                Snapshot::CURRENT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Newest snapshot that loads cleanly
    ///
    /// Unreadable snapshots are skipped with a warning so an older one can
    /// still be used.
    pub fn latest(&self) -> Result<Option<Snapshot>, SnapshotError> {
        for sequence in self.list()? {
            match self.load(sequence) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => tracing::warn!(sequence, error = %e, "skipping unreadable snapshot"),
            }
        }
        Ok(None)
    }

    /// Snapshot sequences, newest first
    pub fn list(&self) -> Result<Vec<u64>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut sequences = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let sequence = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("snapshot-"))
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(sequence) = sequence {
                sequences.push(sequence);
            }
        }
        sequences.sort_unstable_by(|a, b| b.cmp(a));
        Ok(sequences)
    }

    /// Delete all but the newest snapshot and `keep_old` older ones
    pub fn prune(&self, keep_old: usize) -> Result<Vec<u64>, SnapshotError> {
        let mut deleted = Vec::new();
        for sequence in self.list()?.into_iter().skip(1 + keep_old) {
            fs::remove_file(self.path_for(sequence))?;
            deleted.push(sequence);
        }
        Ok(deleted)
    }

    fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("snapshot-{:020}.json", sequence))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
