// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log
//!
//! ## Durability Guarantees
//!
//! - Every write is followed by `fsync()` before returning
//! - Checksums detect corruption from bit flips
//! - Truncated writes (crash during append) are detected on read
//! - `OperationStore::repair` truncates the WAL at the last valid entry

mod entry;
mod reader;
mod record;
mod writer;

pub use entry::WalEntry;
pub use reader::{WalEntryIter, WalReadError, WalReader, WalValidation};
pub use record::StoreOp;
pub use writer::WalWriter;
