// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration record for one managed process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use devtool_core::{ProcessId, DEFAULT_RING_CAPACITY};

/// Everything needed to (re)construct a managed process. `Restart`
/// rebuilds the child from this record, so it must stay self-contained.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Caller-assigned ID, unique within the daemon.
    pub id: ProcessId,
    /// Project the owning RPC session advertises; scopes cleanup.
    pub project_path: PathBuf,
    /// Working directory for the child.
    pub dir: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Capacity of each stdio ring.
    pub ring_capacity: usize,
    /// Upper bound for `run_sync` before the child is stopped.
    pub request_timeout: Option<Duration>,
    /// Free-form labels carried through to listings.
    pub labels: HashMap<String, String>,
    /// Templates containing `{url}` that extend the built-in loopback
    /// URL detection on the child's stdout.
    pub url_matchers: Vec<String>,
}

impl ProcessConfig {
    pub fn new(id: impl Into<ProcessId>, dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        let dir = dir.into();
        Self {
            id: id.into(),
            project_path: dir.clone(),
            dir,
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            ring_capacity: DEFAULT_RING_CAPACITY,
            request_timeout: None,
            labels: HashMap::new(),
            url_matchers: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = path.into();
        self
    }

    pub fn with_ring_capacity(mut self, cap: usize) -> Self {
        self.ring_capacity = cap;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}
