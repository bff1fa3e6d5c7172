// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ProbeError, ReachabilityProbe};
use agsync_core::{ConnectivityConfig, RemoteConfig};
use async_trait::async_trait;
use std::time::Duration;

/// `GET {base_url}{probe_path}`; any non-5xx answer counts as reachable
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(remote: &RemoteConfig, connectivity: &ConnectivityConfig) -> Result<Self, ProbeError> {
        // A probe slower than the executor timeout is as good as unreachable
        let timeout = remote.request_timeout.min(Duration::from_secs(5));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            url: format!(
                "{}{}",
                remote.base_url.trim_end_matches('/'),
                connectivity.probe_path
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProbeError::ServerError(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
