// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitor
//!
//! Online means the local link is up AND the remote authority answered a
//! probe. The link alone is not enough (captive portals, remote outages).
//! `failure_threshold` consecutive probe misses go offline; one success
//! comes back. The monitor starts offline until a probe succeeds.

use agsync_adapters::{ProbeError, ReachabilityProbe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Callback = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Debug)]
struct LinkState {
    link_up: bool,
    reachable: bool,
    consecutive_failures: u32,
}

struct Shared {
    state: Mutex<LinkState>,
    failure_threshold: u32,
    online_tx: watch::Sender<bool>,
    callbacks: Mutex<Vec<Callback>>,
}

/// Single source of truth for online/offline
pub struct ConnectivityMonitor<P> {
    probe: P,
    shared: Arc<Shared>,
}

impl<P: Clone> Clone for ConnectivityMonitor<P> {
    fn clone(&self) -> Self {
        Self {
            probe: self.probe.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<P: ReachabilityProbe> ConnectivityMonitor<P> {
    pub fn new(probe: P, failure_threshold: u32) -> Self {
        let (online_tx, _) = watch::channel(false);
        Self {
            probe,
            shared: Arc::new(Shared {
                state: Mutex::new(LinkState {
                    link_up: true,
                    reachable: false,
                    consecutive_failures: 0,
                }),
                failure_threshold: failure_threshold.max(1),
                online_tx,
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.shared.online_tx.borrow()
    }

    /// Receiver that changes on every online/offline transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.online_tx.subscribe()
    }

    /// Call `f` on every transition with the new state
    pub fn on_change(&self, f: impl Fn(bool) + Send + Sync + 'static) {
        self.callbacks().push(Box::new(f));
    }

    /// Local link signal pushed by the platform
    pub fn report_link(&self, up: bool) {
        tracing::debug!(up, "link reported");
        self.update(|state| state.link_up = up);
    }

    /// Fold one probe result into the state
    pub fn record_probe(&self, result: Result<(), ProbeError>) {
        let threshold = self.shared.failure_threshold;
        self.update(|state| match result {
            Ok(()) => {
                state.reachable = true;
                state.consecutive_failures = 0;
            }
            Err(e) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= threshold {
                    state.reachable = false;
                }
                tracing::debug!(
                    failures = state.consecutive_failures,
                    error = %e,
                    "probe missed"
                );
            }
        });
    }

    /// Probe now and return the resulting state
    ///
    /// With the link down there is nothing to probe through.
    pub async fn probe_now(&self) -> bool {
        if !self.state().link_up {
            return false;
        }
        let result = self.probe.probe().await;
        self.record_probe(result);
        self.is_online()
    }

    /// Probe every `interval` until `shutdown` flips to true
    pub fn spawn_probe_loop(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        monitor.probe_now().await;
                    }
                }
            }
            tracing::debug!("probe loop stopped");
        })
    }

    /// Mutate the state and publish the result under one lock, so the
    /// published value always matches the state that produced it
    fn update(&self, f: impl FnOnce(&mut LinkState)) {
        let (online, changed) = {
            let mut state = self.state();
            f(&mut state);
            let online = state.link_up && state.reachable;
            let changed = self.shared.online_tx.send_if_modified(|current| {
                if *current == online {
                    return false;
                }
                *current = online;
                true
            });
            (online, changed)
        };
        if !changed {
            return;
        }

        tracing::info!(online, "connectivity changed");
        for callback in self.callbacks().iter() {
            callback(online);
        }
    }

    fn state(&self) -> MutexGuard<'_, LinkState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn callbacks(&self) -> MutexGuard<'_, Vec<Callback>> {
        self.shared.callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
