// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reachability probes for the remote authority

mod http;

pub use http::HttpProbe;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProbe;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("server error: status {0}")]
    ServerError(u16),
}

/// Lightweight check that the remote authority answers at all
#[async_trait]
pub trait ReachabilityProbe: Clone + Send + Sync + 'static {
    async fn probe(&self) -> Result<(), ProbeError>;
}
