//! Shared helpers for CLI specs
//!
//! Every `Project` gets its own state and socket directories, so specs can
//! run in parallel without sharing a daemon.

use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

/// Points the remote at a closed port so the daemon stays offline
const OFFLINE_CONFIG: &str = r#"
[remote]
base_url = "http://127.0.0.1:9"
request_timeout = "1s"

[connectivity]
probe_interval = "1h"
failure_threshold = 1
"#;

pub struct Project {
    dir: TempDir,
    daemon: Option<Child>,
}

impl Project {
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("state")).unwrap();
        std::fs::write(dir.path().join("state/agsync.toml"), OFFLINE_CONFIG).unwrap();
        Self { dir, daemon: None }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    fn socket_path(&self) -> PathBuf {
        self.dir.path().join("sock/agsyncd.sock")
    }

    fn env(&self, cmd: &mut StdCommand) {
        cmd.env("AGSYNC_STATE_DIR", self.state_dir())
            .env("AGSYNC_SOCKET_DIR", self.dir.path().join("sock"))
            .env("RUST_LOG", "info");
    }

    /// `agsync` with this project's environment
    pub fn agsync(&self) -> Cli {
        let mut cmd = StdCommand::new(assert_cmd::cargo::cargo_bin("agsync"));
        self.env(&mut cmd);
        Cli {
            cmd: Command::from_std(cmd),
        }
    }

    /// `agsyncd` with this project's environment, not yet spawned
    pub fn agsyncd(&self) -> StdCommand {
        let mut cmd = StdCommand::new(assert_cmd::cargo::cargo_bin("agsyncd"));
        self.env(&mut cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Spawn the daemon and wait for its socket
    pub fn start_daemon(&mut self) {
        let child = self.agsyncd().spawn().unwrap();
        self.daemon = Some(child);
        wait_for(|| self.socket_path().exists(), "daemon socket");
    }

    /// Wait for a daemon stopped through the CLI to exit
    pub fn wait_daemon_exit(&mut self) {
        if let Some(mut child) = self.daemon.take() {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(10) {
                if child.try_wait().unwrap().is_some() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            panic!("daemon did not exit");
        }
    }

    pub fn daemon_log(&self) -> String {
        std::fs::read_to_string(self.state_dir().join("agsyncd.log")).unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(mut child) = self.daemon.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

pub fn wait_for(mut check: impl FnMut() -> bool, what: &str) {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(10) {
        if check() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("timed out waiting for {}", what);
}

pub struct Cli {
    cmd: Command,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn passes(mut self) -> Run {
        Run {
            assert: self.cmd.assert().success(),
        }
    }

    pub fn fails(mut self) -> Run {
        Run {
            assert: self.cmd.assert().failure(),
        }
    }
}

pub struct Run {
    assert: assert_cmd::assert::Assert,
}

impl Run {
    pub fn stdout_has(self, needle: &str) -> Self {
        Self {
            assert: self.assert.stdout(contains(needle)),
        }
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        Self {
            assert: self.assert.stderr(contains(needle)),
        }
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.assert.get_output().stdout).into_owned()
    }
}
