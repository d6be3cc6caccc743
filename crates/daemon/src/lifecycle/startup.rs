// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use devtool_tracker::{FileTracker, ProcessTracker};
use fs2::FileExt;
use tokio::net::UnixListener;
use tracing::{info, warn};

use super::{Config, LifecycleError};

/// Result of daemon startup. The listener is returned unstarted so the
/// caller spawns it as a task.
pub struct StartupResult {
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    pub lock_file: File,
    pub listener: UnixListener,
    pub tracker: Arc<FileTracker>,
    /// Process groups killed by the orphan sweep.
    pub orphans_killed: usize,
}

/// Start the daemon: lock, sweep orphans, bind the socket.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. State directory (needed for socket, lock, tracking file).
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire the lock file FIRST - prevents races.
    // Open without truncating so a failed lock leaves the running
    // daemon's PID intact.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    // Write our PID now that we hold the lock.
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Orphan sweep BEFORE recording the new daemon pid: children of
    // a crashed predecessor are killed by process group, then the
    // tracking document is reset for this daemon.
    let tracker = Arc::new(FileTracker::new(config.tracking_path.clone()));
    let orphans_killed = match tracker.cleanup_orphans(std::process::id()) {
        Ok(killed) => {
            if killed > 0 {
                warn!(killed, "orphan sweep killed surviving process groups");
            }
            killed
        }
        Err(e) => {
            // Persistence failures never stop the daemon.
            warn!(error = %e, "orphan sweep failed");
            0
        }
    };

    // 4. Remove a stale socket and bind (LAST, after validation).
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)?;

    info!(
        socket = %config.socket_path.display(),
        state_dir = %config.state_dir.display(),
        orphans_killed,
        "daemon ready"
    );

    Ok(StartupResult { lock_file, listener, tracker, orphans_killed })
}

fn cleanup_on_failure(config: &Config) {
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.lock_path);
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
