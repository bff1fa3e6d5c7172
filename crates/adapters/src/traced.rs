// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::probe::{ProbeError, ReachabilityProbe};
use crate::remote::{RemoteAuthority, RemoteError, RemoteRequest, RemoteResponse};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any RemoteAuthority
#[derive(Clone)]
pub struct TracedRemote<R> {
    inner: R,
}

impl<R> TracedRemote<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: RemoteAuthority> RemoteAuthority for TracedRemote<R> {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let span = tracing::info_span!(
            "remote.send",
            op_id = %request.idempotency_token,
            kind = %request.kind,
            target_type = %request.target_type,
        );

        async {
            tracing::debug!(record_id = ?request.record_id, "sending");

            let start = std::time::Instant::now();
            let result = self.inner.send(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(response) if response.is_success() => tracing::info!(
                    status = response.status,
                    remote_id = ?response.remote_id,
                    elapsed_ms,
                    "applied"
                ),
                Ok(response) => tracing::warn!(
                    status = response.status,
                    elapsed_ms,
                    "remote refused"
                ),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "send failed"),
            }

            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any ReachabilityProbe
#[derive(Clone)]
pub struct TracedProbe<P> {
    inner: P,
}

impl<P> TracedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: ReachabilityProbe> ReachabilityProbe for TracedProbe<P> {
    async fn probe(&self) -> Result<(), ProbeError> {
        let start = std::time::Instant::now();
        let result = self.inner.probe().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Probes run every few seconds; only failures are worth more than trace
        match &result {
            Ok(()) => tracing::trace!(elapsed_ms, "probe ok"),
            Err(e) => tracing::debug!(elapsed_ms, error = %e, "probe failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
