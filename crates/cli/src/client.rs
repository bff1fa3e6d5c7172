// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use agsync_core::{OperationKind, QueuedOperation, SyncStatus};
use agsync_daemon::paths::STARTUP_MARKER_PREFIX;
use agsync_daemon::protocol::{self, ProtocolError};
use agsync_daemon::{Paths, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("AGSYNC_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// `sync` waits on a probe and a drain pass before the daemon answers
pub fn timeout_sync() -> Duration {
    parse_duration_ms("AGSYNC_TIMEOUT_SYNC_MS").unwrap_or(Duration::from_secs(15))
}

/// Timeout for waiting for the daemon process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("AGSYNC_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(5))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("AGSYNC_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Storage full: {capacity} operations already queued")]
    StorageFull { capacity: usize },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to a running daemon (never starts one)
    pub fn connect(paths: &Paths) -> Result<Self, ClientError> {
        if !paths.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self {
            socket_path: paths.socket_path.clone(),
        })
    }

    async fn send_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            // Stale socket left by a killed daemon
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound
                ) =>
            {
                return Err(ClientError::DaemonNotRunning)
            }
            Err(e) => return Err(e.into()),
        };
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes = tokio::time::timeout(timeout, protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc()).await
    }

    /// Queue an operation, returning its id
    pub async fn submit(
        &self,
        kind: OperationKind,
        target_type: &str,
        payload: serde_json::Value,
    ) -> Result<String, ClientError> {
        match self
            .send(Request::Submit {
                kind,
                target_type: target_type.to_string(),
                payload,
            })
            .await?
        {
            Response::Submitted { id } => Ok(id),
            Response::StorageFull { capacity } => Err(ClientError::StorageFull { capacity }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<SyncStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn dead_letters(&self) -> Result<Vec<QueuedOperation>, ClientError> {
        match self.send(Request::DeadLetters).await? {
            Response::DeadLetters { operations } => Ok(operations),
            other => Err(unexpected(other)),
        }
    }

    /// Returns false when `id` is not a dead letter
    pub async fn requeue(&self, id: &str) -> Result<bool, ClientError> {
        match self.send(Request::Requeue { id: id.to_string() }).await? {
            Response::Requeued { requeued } => Ok(requeued),
            other => Err(unexpected(other)),
        }
    }

    /// Probe and drain now, returning the status afterwards
    pub async fn sync_now(&self) -> Result<SyncStatus, ClientError> {
        match self
            .send_with_timeout(Request::SyncNow, timeout_sync())
            .await?
        {
            Response::Status { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn report_link(&self, up: bool) -> Result<(), ClientError> {
        match self.send(Request::ReportLink { up }).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Stop the daemon and wait for it to exit
///
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(paths: &Paths) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(paths) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => return Ok(false),
        Err(e) => return Err(e),
    };

    match client.shutdown().await {
        Ok(()) => {}
        Err(ClientError::DaemonNotRunning) => return Ok(false),
        Err(e) => return Err(e),
    }

    // The daemon finishes its current drain pass and snapshots the store
    // before exiting; wait for it so a following start does not race the lock
    if let Some(pid) = read_daemon_pid(paths) {
        wait_for_exit(pid, timeout_exit()).await;
    }
    Ok(true)
}

async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(paths: &Paths) -> Option<u32> {
    std::fs::read_to_string(&paths.lock_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // Use kill -0 to check if process exists without sending a signal
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Read daemon log from the last startup marker, looking for errors.
pub fn read_startup_error(paths: &Paths) -> Option<String> {
    let content = std::fs::read_to_string(&paths.log_path).ok()?;
    startup_error_in(&content)
}

fn startup_error_in(log: &str) -> Option<String> {
    let start_pos = log.rfind(STARTUP_MARKER_PREFIX)?;
    let messages: Vec<String> = log[start_pos..]
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
