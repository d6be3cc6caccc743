// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-scoped facade over the process and proxy managers.
//!
//! The RPC layer tags every operation with the caller's project path;
//! the facade threads it through so fuzzy lookups and cleanup stay
//! inside the session, enforces the shutting-down flag uniformly, and
//! reduces every failure to a `(taxonomy kind, short reason)` pair.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use devtool_core::ErrorKind;
use devtool_proc::{ProcError, ProcessConfig, ProcessInfo, ProcessManager};
use devtool_proxy::{ProxyConfig, ProxyError, ProxyInfo, ProxyManager};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// User-visible failure: taxonomy kind plus a short reason string.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct SupervisorError {
    pub kind: ErrorKind,
    pub reason: String,
}

impl SupervisorError {
    fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

impl From<ProcError> for SupervisorError {
    fn from(e: ProcError) -> Self {
        Self { kind: e.kind(), reason: e.to_string() }
    }
}

impl From<ProxyError> for SupervisorError {
    fn from(e: ProxyError) -> Self {
        Self { kind: e.kind(), reason: e.to_string() }
    }
}

pub struct Supervisor {
    procs: Arc<ProcessManager>,
    proxies: Arc<ProxyManager>,
    shutting_down: AtomicBool,
    /// Parent token for per-operation cancellation.
    root_cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(procs: Arc<ProcessManager>, proxies: Arc<ProxyManager>) -> Arc<Self> {
        Arc::new(Self {
            procs,
            proxies,
            shutting_down: AtomicBool::new(false),
            root_cancel: CancellationToken::new(),
        })
    }

    pub fn procs(&self) -> &Arc<ProcessManager> {
        &self.procs
    }

    pub fn proxies(&self) -> &Arc<ProxyManager> {
        &self.proxies
    }

    pub fn root_cancel(&self) -> &CancellationToken {
        &self.root_cancel
    }

    /// Flip the flag; every subsequent operation is refused uniformly.
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), SupervisorError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SupervisorError::new(
                ErrorKind::StateConflict,
                "daemon is shutting down",
            ));
        }
        Ok(())
    }

    /// Start a supervised process for the session's project.
    pub async fn start_process(
        &self,
        project_path: &Path,
        config: ProcessConfig,
    ) -> Result<ProcessInfo, SupervisorError> {
        self.ensure_open()?;
        let config = config.with_project_path(project_path);
        let cancel = self.root_cancel.child_token();
        let proc = self.procs.start_command(config, &cancel)?;
        Ok(proc.info())
    }

    /// Stop a process, scoped to the caller's project.
    pub async fn stop_process(
        &self,
        project_path: &Path,
        id: &str,
    ) -> Result<(), SupervisorError> {
        self.ensure_open()?;
        let proc = self
            .procs
            .get(id)
            .filter(|p| p.config().project_path == project_path)
            .ok_or_else(|| {
                SupervisorError::new(ErrorKind::NotFound, format!("process not found: {}", id))
            })?;
        let cancel = self.root_cancel.child_token();
        self.procs.stop_process(&proc, &cancel).await?;
        Ok(())
    }

    pub async fn restart_process(
        &self,
        project_path: &Path,
        id: &str,
    ) -> Result<ProcessInfo, SupervisorError> {
        self.ensure_open()?;
        // Scope check before touching the registry.
        self.procs
            .get(id)
            .filter(|p| p.config().project_path == project_path)
            .ok_or_else(|| {
                SupervisorError::new(ErrorKind::NotFound, format!("process not found: {}", id))
            })?;
        let cancel = self.root_cancel.child_token();
        let proc = self.procs.restart(id, &cancel).await?;
        Ok(proc.info())
    }

    pub fn list_processes(&self, project_path: Option<&Path>) -> Vec<ProcessInfo> {
        match project_path {
            Some(path) => self.procs.list_by_path(path),
            None => self.procs.list(),
        }
    }

    /// Start a proxy for the session's project.
    pub async fn start_proxy(
        &self,
        project_path: &Path,
        config: ProxyConfig,
    ) -> Result<ProxyInfo, SupervisorError> {
        self.ensure_open()?;
        let mut config = config;
        config.project_path = project_path.to_path_buf();
        let server = self.proxies.start(config).await?;
        Ok(server.info())
    }

    /// Stop a proxy by exact or fuzzy ID, scoped to the project.
    pub async fn stop_proxy(
        &self,
        project_path: &Path,
        id: &str,
    ) -> Result<(), SupervisorError> {
        self.ensure_open()?;
        let cancel = self.root_cancel.child_token();
        self.proxies.stop(id, Some(project_path), &cancel).await?;
        Ok(())
    }

    pub fn list_proxies(&self, project_path: Option<&Path>) -> Vec<ProxyInfo> {
        match project_path {
            Some(path) => self.proxies.list_by_path(path),
            None => self.proxies.list(),
        }
    }

    /// Swap a proxy's chaos rule set to a named preset.
    pub fn apply_chaos_preset(
        &self,
        project_path: &Path,
        id: &str,
        preset: &str,
    ) -> Result<(), SupervisorError> {
        self.ensure_open()?;
        let rules = devtool_chaos::preset_rules(preset).ok_or_else(|| {
            SupervisorError::new(ErrorKind::NotFound, format!("unknown chaos preset: {}", preset))
        })?;
        let server = self.proxies.get(id, Some(project_path))?;
        server
            .chaos()
            .set_rules(rules)
            .map_err(|e| SupervisorError::new(ErrorKind::StateConflict, e.to_string()))?;
        info!(proxy = %server.id(), preset, "chaos preset applied");
        Ok(())
    }

    /// Remove every chaos rule from a proxy.
    pub fn clear_chaos(&self, project_path: &Path, id: &str) -> Result<(), SupervisorError> {
        self.ensure_open()?;
        let server = self.proxies.get(id, Some(project_path))?;
        server
            .chaos()
            .set_rules(Vec::new())
            .map_err(|e| SupervisorError::new(ErrorKind::StateConflict, e.to_string()))?;
        Ok(())
    }

    /// Reap everything a disconnected session owned. Best-effort: the
    /// outcome is logged, peers in other sessions are untouched.
    pub async fn session_closed(&self, project_path: &Path) {
        info!(path = %project_path.display(), "session closed, reaping scoped resources");
        let cancel = self.root_cancel.child_token();
        let (procs, proxies) = tokio::join!(
            self.procs.stop_by_project_path(project_path, &cancel),
            self.proxies.stop_by_project_path(project_path, &cancel),
        );
        if let Err(e) = procs {
            warn!(error = %e, "session process cleanup incomplete");
        }
        if let Err(e) = proxies {
            warn!(error = %e, "session proxy cleanup incomplete");
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
