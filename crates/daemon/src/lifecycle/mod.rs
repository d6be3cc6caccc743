// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: paths, startup, recovery.

mod startup;
pub use startup::{startup, StartupResult};

use std::path::PathBuf;

use thiserror::Error;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/devtool)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to the child-process tracking document
    pub tracking_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// One daemon serves all projects for a user; paths live under
    /// `$XDG_STATE_HOME/devtool` (or `~/.local/state/devtool`), the
    /// socket under `$XDG_RUNTIME_DIR`.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            socket_path: crate::env::socket_path(),
            lock_path: state_dir.join("daemon.pid"),
            tracking_path: state_dir.join("pids.json"),
            log_path: state_dir.join("daemon.log"),
            state_dir,
        })
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another daemon holds the lock: {0}")]
    LockFailed(std::io::Error),

    #[error("no usable state directory (HOME unset)")]
    NoStateDir,

    #[error("pid tracking: {0}")]
    Tracker(#[from] devtool_tracker::TrackerError),
}
