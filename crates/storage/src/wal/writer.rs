// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL writer for durable append operations
//!
//! Every append is fsync'd before returning. Compaction rewrites the
//! surviving tail through a temp file and an atomic rename.

use super::entry::WalEntry;
use super::reader::WalReader;
use super::record::StoreOp;
use crate::store::StoreError;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// WAL writer for durable append operations
pub struct WalWriter {
    path: PathBuf,
    file: File,
    next_sequence: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// The next sequence is one past the last valid entry, and never below
    /// `floor` (the first sequence not covered by a snapshot).
    pub fn open(path: &Path, floor: u64) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let scanned = WalReader::open_or_empty(path)
            .last_sequence()?
            .map(|s| s + 1)
            .unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_sequence: scanned.max(floor),
        })
    }

    /// Append an op to the WAL
    ///
    /// Returns the assigned sequence number. The entry is durably
    /// persisted (fsync'd) before this method returns.
    pub fn append(&mut self, op: StoreOp) -> Result<u64, StoreError> {
        let entry = WalEntry::new(self.next_sequence, op);
        self.write_entry(&entry)
    }

    /// Append an op with a specific timestamp (for testing)
    pub fn append_with_timestamp(
        &mut self,
        op: StoreOp,
        timestamp_micros: u64,
    ) -> Result<u64, StoreError> {
        let entry = WalEntry::new_with_timestamp(self.next_sequence, timestamp_micros, op);
        self.write_entry(&entry)
    }

    fn write_entry(&mut self, entry: &WalEntry) -> Result<u64, StoreError> {
        let mut line = entry.to_line()?;
        line.push('\n');
        append_or_rollback(&mut self.file, |file| {
            file.write_all(line.as_bytes())?;
            file.sync_all()
        })?;

        self.next_sequence += 1;
        Ok(entry.sequence)
    }

    /// Drop every entry at or below `through`
    ///
    /// Entries above it are copied to `wal.jsonl.tmp`, synced, and renamed
    /// over the live file. A crash at any point leaves either the old or the
    /// new file intact.
    pub fn compact(&mut self, through: u64) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let tmp = File::create(&tmp_path)?;
            let mut out = BufWriter::new(tmp);
            for entry in WalReader::open_or_empty(&self.path).entries_from(through + 1)? {
                let Ok(entry) = entry else { break };
                out.write_all(entry.resealed().to_line()?.as_bytes())?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }

    /// Sequence number the next append will receive
    pub fn sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Last assigned sequence number, if any entry has been written
    pub fn last_sequence(&self) -> Option<u64> {
        self.next_sequence.checked_sub(1)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run `write` against the end of `file`, cutting the file back to its
/// previous length if it fails so no partial line is left behind
fn append_or_rollback<F>(file: &mut File, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let start = file.metadata()?.len();
    let result = write(file);
    if result.is_err() {
        if let Err(e) = file.set_len(start) {
            tracing::error!(error = %e, "failed to roll back partial WAL write");
        }
    }
    result
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
