// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL entry structure with checksum verification

use super::record::StoreOp;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Why a line could not be turned back into an entry
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// On-disk shape with the op kept as the exact bytes that were hashed
#[derive(Deserialize)]
struct RawEntry<'a> {
    sequence: u64,
    timestamp_micros: u64,
    #[serde(borrow)]
    op: &'a RawValue,
    checksum: u32,
}

/// A single entry in the write-ahead log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    /// Microseconds since Unix epoch
    pub timestamp_micros: u64,
    /// The state change being recorded
    pub op: StoreOp,
    /// CRC32 checksum of serialized op
    pub checksum: u32,
}

impl WalEntry {
    /// Create a new WAL entry with computed checksum
    pub fn new(sequence: u64, op: StoreOp) -> Self {
        let timestamp_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::new_with_timestamp(sequence, timestamp_micros, op)
    }

    /// Create a new WAL entry with a specific timestamp (for testing)
    pub fn new_with_timestamp(sequence: u64, timestamp_micros: u64, op: StoreOp) -> Self {
        let checksum = Self::calculate_checksum(&op);
        Self {
            sequence,
            timestamp_micros,
            op,
            checksum,
        }
    }

    fn calculate_checksum(op: &StoreOp) -> u32 {
        // StoreOp holds only strings, integers, timestamps and JSON values,
        // all of which serialize infallibly
        let json = serde_json::to_string(op).unwrap_or_default();
        crc32fast::hash(json.as_bytes())
    }

    /// Verify the checksum matches the op
    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.op)
    }

    /// Serialize to one line of JSON
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a single line of JSON
    ///
    /// The checksum is checked against the op text as written, so payload
    /// numbers that re-serialize differently still verify.
    pub fn from_line(line: &str) -> Result<Self, EntryError> {
        let raw: RawEntry<'_> = serde_json::from_str(line)?;
        if crc32fast::hash(raw.op.get().as_bytes()) != raw.checksum {
            return Err(EntryError::ChecksumMismatch);
        }
        Ok(Self {
            sequence: raw.sequence,
            timestamp_micros: raw.timestamp_micros,
            op: serde_json::from_str(raw.op.get())?,
            checksum: raw.checksum,
        })
    }

    /// Same entry with the checksum recomputed from the parsed op
    pub fn resealed(self) -> Self {
        Self::new_with_timestamp(self.sequence, self.timestamp_micros, self.op)
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
