// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! devtool-tracker: crash-safe on-disk registry of spawned children.
//!
//! The daemon records every child it spawns in a single JSON document.
//! On startup the new daemon reads the previous document and kills any
//! process group that survived a daemon crash, so children can never
//! outlive their supervisor unnoticed. All writes are atomic (temp +
//! rename) and all persistence failures are non-fatal to the caller.

pub mod file;
pub mod memory;
pub mod os;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use devtool_core::ErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileTracker;
pub use memory::MemoryTracker;

/// One tracked child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedProcess {
    pub id: String,
    pub pid: u32,
    pub pgid: u32,
    pub project_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// The on-disk document. Versioned implicitly by field presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingFile {
    pub daemon_pid: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub processes: Vec<TrackedProcess>,
}

impl TrackingFile {
    pub fn fresh(daemon_pid: u32) -> Self {
        Self { daemon_pid, updated_at: Utc::now(), processes: Vec::new() }
    }
}

/// Errors from tracker persistence. All map to the `Persistence` kind:
/// callers log them at warning level and continue.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no writable state directory")]
    NoStateDir,
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Persistence
    }
}

/// Narrow tracking capability consumed by the process manager.
///
/// The manager only ever adds, removes, sweeps, and clears; exposing
/// exactly that lets manager tests run against [`MemoryTracker`].
pub trait ProcessTracker: Send + Sync {
    fn add(&self, entry: TrackedProcess) -> Result<(), TrackerError>;
    fn remove(&self, id: &str) -> Result<(), TrackerError>;
    fn load(&self) -> Result<TrackingFile, TrackerError>;
    fn clear(&self) -> Result<(), TrackerError>;

    /// Kill surviving process groups from a previous daemon run and
    /// reset the document for `current_daemon_pid`. Returns the number
    /// of groups signalled.
    fn cleanup_orphans(&self, current_daemon_pid: u32) -> Result<usize, TrackerError>;
}
