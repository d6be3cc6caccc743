// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory tracker for tests.

use chrono::Utc;
use parking_lot::Mutex;

use crate::{ProcessTracker, TrackedProcess, TrackerError, TrackingFile};

/// Tracker backed by a plain in-memory document. Manager tests use this
/// to observe add/remove notifications without touching the filesystem.
#[derive(Default)]
pub struct MemoryTracker {
    doc: Mutex<Option<TrackingFile>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs currently tracked, in insertion order.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.doc
            .lock()
            .as_ref()
            .map(|d| d.processes.iter().map(|p| p.id.clone()).collect())
            .unwrap_or_default()
    }
}

impl ProcessTracker for MemoryTracker {
    fn add(&self, entry: TrackedProcess) -> Result<(), TrackerError> {
        let mut doc = self.doc.lock();
        let doc = doc.get_or_insert_with(|| TrackingFile::fresh(std::process::id()));
        doc.processes.retain(|p| p.id != entry.id);
        doc.processes.push(entry);
        doc.updated_at = Utc::now();
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), TrackerError> {
        if let Some(doc) = self.doc.lock().as_mut() {
            doc.processes.retain(|p| p.id != id);
            doc.updated_at = Utc::now();
        }
        Ok(())
    }

    fn load(&self) -> Result<TrackingFile, TrackerError> {
        Ok(self
            .doc
            .lock()
            .clone()
            .unwrap_or_else(|| TrackingFile::fresh(std::process::id())))
    }

    fn clear(&self) -> Result<(), TrackerError> {
        if let Some(doc) = self.doc.lock().as_mut() {
            doc.processes.clear();
            doc.updated_at = Utc::now();
        }
        Ok(())
    }

    fn cleanup_orphans(&self, current_daemon_pid: u32) -> Result<usize, TrackerError> {
        *self.doc.lock() = Some(TrackingFile::fresh(current_daemon_pid));
        Ok(0)
    }
}
