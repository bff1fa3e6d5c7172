// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use agsync_adapters::{HttpProbe, HttpRemote, TracedProbe, TracedRemote};
use agsync_core::{ConfigError, SyncConfig, SystemClock, UuidIdGen};
use agsync_daemon::Paths;
use agsync_engine::{ConnectivityMonitor, Executor, SyncClient, SyncCoordinator};
use agsync_storage::{OperationStore, StoreConfig, StoreError};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Client facade with the concrete adapters (wrapped with tracing)
pub type DaemonClient =
    SyncClient<TracedRemote<HttpRemote>, TracedProbe<HttpProbe>, SystemClock, UuidIdGen>;

/// Daemon state during operation
pub struct DaemonState {
    pub paths: Paths,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub client: DaemonClient,
    store: Arc<OperationStore>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    ///
    /// Background loops finish their current pass before the store is
    /// closed, so no claim is left without a recorded outcome unless the
    /// process is killed.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");
        let DaemonState {
            paths,
            lock_file,
            listener,
            client,
            store,
            shutdown_tx,
            tasks,
            ..
        } = self;

        // 1. Stop accepting connections
        drop(listener);

        // 2. Stop coordinator and probe loops
        let _ = shutdown_tx.send(true);
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task failed: {}", e);
            }
        }

        // 3. Close the store (snapshot + compaction)
        drop(client);
        match Arc::try_unwrap(store) {
            Ok(store) => store.close()?,
            Err(store) => store.snapshot()?,
        }

        // 4. Remove socket, version and PID files
        for path in [&paths.socket_path, &paths.version_path, &paths.lock_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        // 5. Lock is released when the file handle drops
        drop(lock_file);

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Adapter setup failed: {0}")]
    Adapter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(
    paths: &Paths,
    config_path: Option<PathBuf>,
) -> Result<DaemonState, LifecycleError> {
    match startup_inner(paths, config_path).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(paths);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(
    paths: &Paths,
    config_path: Option<PathBuf>,
) -> Result<DaemonState, LifecycleError> {
    // 1. Create state and socket directories
    std::fs::create_dir_all(&paths.state_dir)?;
    if let Some(parent) = paths.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents two daemons sharing one store
    // Not truncated until the lock is ours: the PID inside belongs to the holder
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    std::fs::write(&paths.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Load config BEFORE touching the store (fail fast)
    let config_path = config_path.unwrap_or_else(|| paths.config_path.clone());
    let config = SyncConfig::load(&config_path)?;
    info!("Loaded config from {}", config_path.display());

    // 4. Repair, open and recover the store
    let repaired = OperationStore::repair(&paths.store_dir)?;
    if repaired > 0 {
        warn!(bytes = repaired, "truncated torn WAL tail");
    }
    let store = Arc::new(OperationStore::open(
        &paths.store_dir,
        StoreConfig {
            capacity: config.queue.capacity,
            snapshot_interval: config.storage.snapshot_interval,
            keep_old_snapshots: config.storage.keep_old_snapshots,
        },
    )?);
    let recovered = store.recover_in_flight()?;
    let counts = store.counts();
    info!(
        "Loaded queue: {} pending, {} dead-lettered, {} recovered from crash",
        counts.pending,
        counts.dead_lettered,
        recovered.len()
    );

    // 5. Set up adapters (wrapped with tracing for observability)
    let remote = HttpRemote::new(&config.remote)
        .map_err(|e| LifecycleError::Adapter(e.to_string()))?;
    let probe = HttpProbe::new(&config.remote, &config.connectivity)
        .map_err(|e| LifecycleError::Adapter(e.to_string()))?;

    let monitor = ConnectivityMonitor::new(
        TracedProbe::new(probe),
        config.connectivity.failure_threshold,
    );

    let coordinator = SyncCoordinator::new(
        Arc::clone(&store),
        Executor::new(TracedRemote::new(remote), config.remote.request_timeout),
        monitor.clone(),
        SystemClock,
        config.retry.policy(),
        config.coordinator.clone(),
    );

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    // 7. Spawn background loops
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let probe_loop =
        monitor.spawn_probe_loop(config.connectivity.probe_interval, shutdown_rx.clone());
    let drain_loop = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(shutdown_rx).await })
    };

    info!("Daemon started, remote {}", config.remote.base_url);

    Ok(DaemonState {
        paths: paths.clone(),
        lock_file,
        listener,
        client: SyncClient::new(coordinator, SystemClock, UuidIdGen),
        store,
        shutdown_tx,
        tasks: vec![probe_loop, drain_loop],
        shutdown_requested: false,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(paths: &Paths) {
    for path in [&paths.socket_path, &paths.version_path, &paths.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}
