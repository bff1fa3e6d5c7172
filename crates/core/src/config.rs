// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync configuration loaded from TOML
//!
//! ```toml
//! [remote]
//! base_url = "https://api.example.org"
//! request_timeout = "10s"
//!
//! [retry]
//! max_attempts = 5
//! base_delay = "2s"
//! max_delay = "5m"
//! ```

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Remote authority connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub auth_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum live records before submissions fail with `StorageFull`
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay: policy.base_delay,
            max_delay: policy.max_delay,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Entities drained concurrently
    pub concurrency: usize,
    /// Safety-net drain period
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
    /// Most operations attempted in one pass
    pub batch_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            sync_interval: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    #[serde(with = "humantime_serde")]
    pub probe_interval: Duration,
    /// Consecutive probe misses before going offline
    pub failure_threshold: u32,
    pub probe_path: String,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
            failure_threshold: 3,
            probe_path: "/health".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// WAL operations between snapshots
    pub snapshot_interval: u64,
    pub keep_old_snapshots: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 1000,
            keep_old_snapshots: 2,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub remote: RemoteConfig,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
    pub coordinator: CoordinatorConfig,
    pub connectivity: ConnectivityConfig,
    pub storage: StorageConfig,
}

impl SyncConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be > 0".into()));
        }
        if self.coordinator.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.concurrency must be > 0".into(),
            ));
        }
        if self.coordinator.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.batch_size must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ConfigError::Invalid(
                "retry.base_delay must not exceed retry.max_delay".into(),
            ));
        }
        if self.connectivity.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "connectivity.failure_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
