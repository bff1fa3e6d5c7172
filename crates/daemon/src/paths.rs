// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Where the daemon keeps its files
//!
//! State dir: `AGSYNC_STATE_DIR`, else `$XDG_STATE_HOME/agsync`, else
//! `~/.local/state/agsync`. Socket dir: `AGSYNC_SOCKET_DIR`, else
//! `/tmp/agsync` (kept short for SUN_LEN on macOS).

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- agsyncd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- agsyncd: starting (pid: ";

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("could not determine state directory (set AGSYNC_STATE_DIR or HOME)")]
    NoStateDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub store_dir: PathBuf,
    pub config_path: PathBuf,
}

impl Paths {
    /// Resolve from the environment
    pub fn from_env() -> Result<Self, PathsError> {
        Ok(Self::new(&state_dir()?, &socket_dir()))
    }

    pub fn new(state_dir: &Path, socket_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: socket_dir.join("agsyncd.sock"),
            lock_path: state_dir.join("agsyncd.pid"),
            version_path: state_dir.join("agsyncd.version"),
            log_path: state_dir.join("agsyncd.log"),
            store_dir: state_dir.join("store"),
            config_path: state_dir.join("agsync.toml"),
        }
    }
}

fn state_dir() -> Result<PathBuf, PathsError> {
    if let Some(dir) = non_empty_var("AGSYNC_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty_var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("agsync"));
    }
    let home = non_empty_var("HOME").ok_or(PathsError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/agsync"))
}

fn socket_dir() -> PathBuf {
    non_empty_var("AGSYNC_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/agsync"))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_state_and_socket_dirs() {
        let paths = Paths::new(Path::new("/var/lib/agsync"), Path::new("/run/agsync"));
        assert_eq!(paths.socket_path, PathBuf::from("/run/agsync/agsyncd.sock"));
        assert_eq!(paths.lock_path, PathBuf::from("/var/lib/agsync/agsyncd.pid"));
        assert_eq!(paths.store_dir, PathBuf::from("/var/lib/agsync/store"));
        assert_eq!(paths.config_path, PathBuf::from("/var/lib/agsync/agsync.toml"));
    }
}
