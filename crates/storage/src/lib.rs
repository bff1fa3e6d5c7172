// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Local durable store for queued operations
//!
//! ```text
//! OperationStore ─ StoreOp → WalEntry → WalWriter → disk (wal.jsonl)
//!                                                      ↓
//!            snapshots/ ──→ QueueState ←── WalReader (replay on open)
//! ```
//!
//! Every state change is one fsync'd WAL entry. The in-memory `QueueState`
//! is only updated after the entry is durable, so a crash mid-transition
//! leaves the record in its pre-transition state.

mod snapshot;
mod state;
mod store;
pub mod wal;

pub use snapshot::{Snapshot, SnapshotError, SnapshotManager};
pub use state::{ApplyError, QueueState};
pub use store::{OperationStore, StoreConfig, StoreError};
pub use wal::{StoreOp, WalEntry, WalReadError, WalReader, WalWriter};
