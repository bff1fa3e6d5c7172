// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL reader for iterating and validating entries
//!
//! Invalid entries (checksum mismatch or parse errors) mark the truncation
//! point. Nothing after the first invalid entry is trusted.

use super::entry::{EntryError, WalEntry};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when reading WAL entries
#[derive(Debug, Error)]
pub enum WalReadError {
    #[error("corrupted entry at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// WAL reader for iterating over entries
pub struct WalReader {
    path: PathBuf,
}

impl WalReader {
    /// Create a reader; a missing file reads as empty
    pub fn open_or_empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(&self) -> Result<WalEntryIter, WalReadError> {
        WalEntryIter::new(&self.path, 0)
    }

    /// Iterate over entries with `sequence >= from`
    pub fn entries_from(&self, from: u64) -> Result<WalEntryIter, WalReadError> {
        WalEntryIter::new(&self.path, from)
    }

    /// Last valid sequence number
    pub fn last_sequence(&self) -> Result<Option<u64>, WalReadError> {
        let mut last = None;
        for entry in self.entries()? {
            match entry {
                Ok(entry) => last = Some(entry.sequence),
                Err(_) => break,
            }
        }
        Ok(last)
    }

    /// Scan the whole file and report where (if anywhere) it goes bad
    pub fn validate(&self) -> Result<WalValidation, WalReadError> {
        let mut iter = self.entries()?;
        let mut valid_entries = 0u64;
        let mut last_valid_sequence = None;
        let mut corruption = None;

        for entry in iter.by_ref() {
            match entry {
                Ok(entry) => {
                    valid_entries += 1;
                    last_valid_sequence = Some(entry.sequence);
                }
                Err(e) => {
                    corruption = Some(e.to_string());
                    break;
                }
            }
        }

        Ok(WalValidation {
            valid_entries,
            last_valid_sequence,
            valid_bytes: iter.last_valid_position(),
            corruption,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of validating a WAL file
#[derive(Debug)]
pub struct WalValidation {
    pub valid_entries: u64,
    pub last_valid_sequence: Option<u64>,
    /// Byte length of the valid prefix
    pub valid_bytes: u64,
    pub corruption: Option<String>,
}

/// Iterator over WAL entries with position tracking
pub struct WalEntryIter {
    reader: Option<BufReader<File>>,
    line_number: u64,
    skip_until_sequence: u64,
    position: u64,
    last_valid_position: u64,
    failed: bool,
}

impl WalEntryIter {
    fn new(path: &Path, skip_until_sequence: u64) -> Result<Self, WalReadError> {
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            reader,
            line_number: 0,
            skip_until_sequence,
            position: 0,
            last_valid_position: 0,
            failed: false,
        })
    }

    /// Byte offset just past the last valid entry
    pub fn last_valid_position(&self) -> u64 {
        self.last_valid_position
    }
}

impl Iterator for WalEntryIter {
    type Item = Result<WalEntry, WalReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let reader = self.reader.as_mut()?;

        loop {
            let mut line = String::new();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => n as u64,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(WalReadError::Io(e)));
                }
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.position += bytes_read;
                if line.ends_with('\n') {
                    self.last_valid_position = self.position;
                }
                continue;
            }

            // A line without its newline is a torn write, even if it parses
            if !line.ends_with('\n') {
                self.failed = true;
                return Some(Err(WalReadError::Corrupted {
                    line: self.line_number,
                    reason: "truncated entry".to_string(),
                }));
            }

            let entry = match WalEntry::from_line(trimmed) {
                Ok(e) => e,
                Err(EntryError::ChecksumMismatch) => {
                    self.failed = true;
                    return Some(Err(WalReadError::ChecksumMismatch {
                        line: self.line_number,
                    }));
                }
                Err(EntryError::Json(e)) => {
                    self.failed = true;
                    return Some(Err(WalReadError::Corrupted {
                        line: self.line_number,
                        reason: e.to_string(),
                    }));
                }
            };

            self.position += bytes_read;
            self.last_valid_position = self.position;

            if entry.sequence < self.skip_until_sequence {
                continue;
            }
            return Some(Ok(entry));
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
