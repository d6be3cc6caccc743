// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: DEVTOOL_STATE_DIR > XDG_STATE_HOME/devtool
/// > ~/.local/state/devtool
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("DEVTOOL_STATE_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("devtool"));
        }
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/devtool"))
}

/// Resolve the RPC socket path: DEVTOOL_SOCKET >
/// $XDG_RUNTIME_DIR/devtool-mcp.sock > /tmp/devtool-mcp-<user>.sock
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("DEVTOOL_SOCKET") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
        if !runtime.is_empty() {
            return PathBuf::from(runtime).join("devtool-mcp.sock");
        }
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    std::env::temp_dir().join(format!("devtool-mcp-{}.sock", user))
}

/// Override for the terminate→force-kill budget
/// (`DEVTOOL_GRACEFUL_TIMEOUT_MS`).
pub fn graceful_timeout() -> Duration {
    std::env::var("DEVTOOL_GRACEFUL_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(devtool_proc::DEFAULT_GRACEFUL_TIMEOUT)
}

/// Default shutdown deadline override (`DEVTOOL_SHUTDOWN_DEADLINE_MS`).
pub fn shutdown_deadline() -> Duration {
    std::env::var("DEVTOOL_SHUTDOWN_DEADLINE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(crate::shutdown::DEFAULT_SHUTDOWN_DEADLINE)
}
