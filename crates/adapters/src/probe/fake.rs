// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake reachability probe for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProbeError, ReachabilityProbe};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Probe whose answer is set by the test
#[derive(Clone)]
pub struct FakeProbe {
    reachable: Arc<AtomicBool>,
    scripted: Arc<Mutex<VecDeque<bool>>>,
    probes: Arc<AtomicUsize>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FakeProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(reachable)),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer for every probe without a scripted result
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Queue one-off results consumed before the standing answer
    pub fn script(&self, results: impl IntoIterator<Item = bool>) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(results);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if scripted.unwrap_or_else(|| self.reachable.load(Ordering::SeqCst)) {
            Ok(())
        } else {
            Err(ProbeError::Unreachable("fake probe unreachable".to_string()))
        }
    }
}
