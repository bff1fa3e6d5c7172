// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policy for transient failures
//!
//! Delay after the n-th failed attempt is `base * 2^n + jitter`, with
//! `jitter` drawn from `[0, base)` and the total capped at `max_delay`.
//! Jitter is additive only, so delays never shrink as attempts grow.

use rand::Rng;
use std::time::Duration;

/// Limits and backoff shape for retrying an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed before a transient failure dead-letters the operation
    pub max_attempts: u32,
    /// Backoff base
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Whether an operation that has now failed `attempts` times is out of retries
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Backoff without jitter, capped
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 1u32 << attempts.min(31);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay for the given attempt count with an explicit jitter value
    pub fn delay_for(&self, attempts: u32, jitter: Duration) -> Duration {
        let jitter = jitter.min(self.base_delay);
        self.backoff(attempts)
            .saturating_add(jitter)
            .min(self.max_delay)
    }

    /// Delay for the given attempt count with random jitter
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
        };
        self.delay_for(attempts, jitter)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
