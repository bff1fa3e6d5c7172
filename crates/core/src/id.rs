// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation ids
//!
//! An id is assigned once, at submit, and is sent on every attempt as the
//! idempotency token. It must be unique across devices, not just within one
//! store, and must survive being placed in an HTTP header untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const OP_ID_PREFIX: &str = "op-";

/// Source of operation ids
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// `op-<uuid v4>`
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next_id(&self) -> String {
        format!("{}{}", OP_ID_PREFIX, Uuid::new_v4().hyphenated())
    }
}

/// `<label>-1`, `<label>-2`, ... for tests that assert on ids
///
/// Clones draw from the same counter, so a client rebuilt around a clone
/// after a simulated restart keeps issuing fresh ids.
#[derive(Debug, Clone)]
pub struct SequentialIdGen {
    label: Arc<str>,
    issued: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(label: &str) -> Self {
        Self {
            label: Arc::from(label),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl IdGen for SequentialIdGen {
    fn next_id(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", self.label, n)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
