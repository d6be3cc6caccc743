// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed tracker with atomic writes and directory fallback.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::os;
use crate::{ProcessTracker, TrackedProcess, TrackerError, TrackingFile};

/// Name of the tracking document inside the state directory.
const TRACKING_FILE_NAME: &str = "pids.json";

/// JSON-document tracker persisted under the daemon's state directory.
///
/// Mutations take a read-modify-write cycle under an internal lock; the
/// write lands in a temp sibling first and is renamed into place so a
/// crash mid-write never leaves a torn document.
pub struct FileTracker {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTracker {
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    /// Resolve the default location, falling back when a directory is
    /// not writable: `$XDG_STATE_HOME/devtool` → `~/.local/state/devtool`
    /// → the system temp directory.
    pub fn at_default_location() -> Self {
        Self::new(resolve_state_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<TrackingFile>, TrackerError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, doc: &TrackingFile) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under the internal lock.
    fn update(
        &self,
        mutate: impl FnOnce(&mut TrackingFile),
    ) -> Result<(), TrackerError> {
        let _guard = self.lock.lock();
        let mut doc = self.read()?.unwrap_or_else(|| TrackingFile::fresh(std::process::id()));
        mutate(&mut doc);
        doc.updated_at = Utc::now();
        self.write(&doc)
    }
}

impl ProcessTracker for FileTracker {
    fn add(&self, entry: TrackedProcess) -> Result<(), TrackerError> {
        self.update(|doc| {
            doc.processes.retain(|p| p.id != entry.id);
            doc.processes.push(entry);
        })
    }

    fn remove(&self, id: &str) -> Result<(), TrackerError> {
        self.update(|doc| doc.processes.retain(|p| p.id != id))
    }

    fn load(&self) -> Result<TrackingFile, TrackerError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.unwrap_or_else(|| TrackingFile::fresh(std::process::id())))
    }

    fn clear(&self) -> Result<(), TrackerError> {
        self.update(|doc| doc.processes.clear())
    }

    fn cleanup_orphans(&self, current_daemon_pid: u32) -> Result<usize, TrackerError> {
        let _guard = self.lock.lock();

        let previous = match self.read() {
            Ok(doc) => doc,
            Err(e) => {
                // A corrupt document is unrecoverable; start fresh rather
                // than refuse to boot.
                warn!(error = %e, path = %self.path.display(), "unreadable tracking file, resetting");
                None
            }
        };

        let Some(previous) = previous else {
            self.write(&TrackingFile::fresh(current_daemon_pid))?;
            return Ok(0);
        };

        if previous.daemon_pid == current_daemon_pid {
            debug!("clean restart, no orphan sweep needed");
            return Ok(0);
        }

        let mut killed = 0;
        for entry in &previous.processes {
            if !os::is_alive(entry.pid) {
                continue;
            }
            match os::kill_group(entry.pgid) {
                Ok(()) => {
                    warn!(id = %entry.id, pid = entry.pid, pgid = entry.pgid, "killed orphaned process group");
                    killed += 1;
                }
                // ESRCH: vanished between the probe and the signal.
                Err(e) if e.raw_os_error() == Some(libc_esrch()) => {}
                Err(e) => {
                    warn!(id = %entry.id, pgid = entry.pgid, error = %e, "orphan kill failed");
                }
            }
        }

        self.write(&TrackingFile::fresh(current_daemon_pid))?;
        Ok(killed)
    }
}

#[cfg(unix)]
fn libc_esrch() -> i32 {
    nix::errno::Errno::ESRCH as i32
}

#[cfg(not(unix))]
fn libc_esrch() -> i32 {
    3
}

/// Fallback chain for the tracking file location.
fn resolve_state_file() -> PathBuf {
    for dir in candidate_dirs() {
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir.join(TRACKING_FILE_NAME);
        }
    }
    std::env::temp_dir().join(TRACKING_FILE_NAME)
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            dirs.push(PathBuf::from(xdg).join("devtool"));
        }
    }
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local/state/devtool"));
    }
    dirs.push(std::env::temp_dir().join("devtool"));
    dirs
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
