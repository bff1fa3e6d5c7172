// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived sync status snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live record counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}

impl QueueCounts {
    /// Records occupying store capacity
    pub fn live(&self) -> usize {
        self.pending + self.in_flight + self.dead_lettered
    }
}

/// Read-only snapshot recomputed on every request, never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub online: bool,
    pub pending_count: usize,
    pub in_flight_count: usize,
    pub dead_letter_count: usize,
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    pub sync_in_progress: bool,
}

impl SyncStatus {
    pub fn from_parts(
        online: bool,
        counts: QueueCounts,
        last_successful_sync_at: Option<DateTime<Utc>>,
        sync_in_progress: bool,
    ) -> Self {
        Self {
            online,
            pending_count: counts.pending,
            in_flight_count: counts.in_flight,
            dead_letter_count: counts.dead_lettered,
            last_successful_sync_at,
            sync_in_progress,
        }
    }

    /// One-line summary for indicators, e.g. "offline, 3 pending, 1 failed"
    pub fn summary(&self) -> String {
        let mut parts = vec![if self.online { "online" } else { "offline" }.to_string()];
        let waiting = self.pending_count + self.in_flight_count;
        if waiting > 0 {
            parts.push(format!("{} pending", waiting));
        }
        if self.dead_letter_count > 0 {
            parts.push(format!(
                "{} failed to sync, review required",
                self.dead_letter_count
            ));
        }
        if waiting == 0 && self.dead_letter_count == 0 {
            parts.push("up to date".to_string());
        }
        parts.join(", ")
    }
}
