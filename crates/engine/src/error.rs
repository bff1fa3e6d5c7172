// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced to callers of the client facade

use agsync_core::ValidationError;
use agsync_storage::StoreError;
use thiserror::Error;

/// Failures a submitter must handle
///
/// Remote failures never appear here; they are absorbed by the coordinator
/// and surface through status and dead letters instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage full: {capacity} operations already queued")]
    StorageFull { capacity: usize },
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StorageFull { capacity } => SyncError::StorageFull { capacity },
            other => SyncError::Storage(other),
        }
    }
}
