// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry deadlines for operations waiting out a backoff
//!
//! Deadlines live in memory only. After a restart every recovered
//! operation is immediately eligible.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct RetryScheduler {
    not_before: HashMap<String, Instant>,
}

impl RetryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `id` back until `now + delay`
    pub fn schedule(&mut self, id: &str, delay: Duration, now: Instant) {
        self.not_before.insert(id.to_string(), now + delay);
    }

    pub fn cancel(&mut self, id: &str) {
        self.not_before.remove(id);
    }

    /// Whether `id` may be attempted at `now`
    pub fn is_due(&self, id: &str, now: Instant) -> bool {
        self.not_before
            .get(id)
            .map(|deadline| now >= *deadline)
            .unwrap_or(true)
    }

    pub fn deadline(&self, id: &str) -> Option<Instant> {
        self.not_before.get(id).copied()
    }

    /// Earliest deadline still in the future relative to `now`
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.not_before.values().filter(|d| **d > now).min().copied()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
