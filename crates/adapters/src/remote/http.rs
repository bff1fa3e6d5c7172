// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP remote authority

use super::{RemoteAuthority, RemoteError, RemoteRequest, RemoteResponse};
use agsync_core::{OperationKind, RemoteConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use std::time::Duration;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Remote authority reached over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RemoteError::InvalidRequest(format!("invalid base url {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidRequest(format!(
                "base url {} cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
            timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Method and path segments for a request, unescaped
    pub fn route(request: &RemoteRequest) -> Result<(Method, Vec<&str>), RemoteError> {
        let target = segment(&request.target_type)?;
        let record = || {
            request
                .record_id
                .as_deref()
                .ok_or_else(|| {
                    RemoteError::InvalidRequest(format!("{} requires a recordId", request.kind))
                })
                .and_then(segment)
        };
        Ok(match request.kind {
            OperationKind::CreateRecord => (Method::POST, vec!["records", target]),
            OperationKind::UpdateRecord => (Method::PUT, vec!["records", target, record()?]),
            OperationKind::DeleteRecord => (Method::DELETE, vec!["records", target, record()?]),
            OperationKind::AppendTelemetry => (Method::POST, vec!["telemetry", target]),
            OperationKind::IssueCommand => (Method::POST, vec!["commands", target]),
        })
    }

    /// Full URL for a request; each segment is percent-encoded on its own
    pub fn endpoint(&self, request: &RemoteRequest) -> Result<(Method, Url), RemoteError> {
        let (method, segments) = Self::route(request)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidRequest("base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok((method, url))
    }

    fn headers(&self, token: &str) -> Result<HeaderMap, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            IDEMPOTENCY_HEADER,
            HeaderValue::from_str(token)
                .map_err(|_| RemoteError::InvalidRequest("invalid idempotency token".into()))?,
        );
        if let Some(auth) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", auth))
                .map_err(|_| RemoteError::InvalidRequest("invalid auth token format".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn map_error(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RemoteAuthority for HttpRemote {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let (method, url) = self.endpoint(request)?;
        let response = self
            .client
            .request(method, url)
            .headers(self.headers(&request.idempotency_token)?)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        Ok(RemoteResponse::new(status, body))
    }
}

/// A path segment must not be empty or a dot segment the URL would collapse
fn segment(value: &str) -> Result<&str, RemoteError> {
    match value {
        "" | "." | ".." => Err(RemoteError::InvalidRequest(format!(
            "'{}' is not a usable path segment",
            value
        ))),
        _ => Ok(value),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
