// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of managed processes with coordinated stop paths.
//!
//! The manager owns the ID→process map, a failed-process counter, a
//! periodic health scan, and the shutdown fan-out. Stop fan-outs run in
//! parallel and collect per-process errors so one stuck child never
//! blocks its peers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devtool_core::{JoinedErrors, ProcessId};
use devtool_tracker::ProcessTracker;
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::ProcessConfig;
use crate::error::ProcError;
use crate::managed::{ManagedProcess, ProcessInfo, DEFAULT_GRACEFUL_TIMEOUT};

/// Interval between liveness scans.
const HEALTH_INTERVAL: Duration = Duration::from_secs(10);

pub struct ProcessManager {
    procs: RwLock<HashMap<ProcessId, Arc<ManagedProcess>>>,
    tracker: Arc<dyn ProcessTracker>,
    failed: Arc<AtomicU64>,
    shutting_down: AtomicBool,
    shutdown_started: AtomicBool,
    health_cancel: CancellationToken,
    health_task: Mutex<Option<JoinHandle<()>>>,
    /// Tracks pump and waiter tasks so shutdown can await them.
    tasks: TaskTracker,
    graceful_timeout: Duration,
}

impl ProcessManager {
    /// Create a manager and spawn its health-scan loop. Must be called
    /// within a tokio runtime.
    pub fn new(tracker: Arc<dyn ProcessTracker>) -> Arc<Self> {
        Self::with_timeouts(tracker, DEFAULT_GRACEFUL_TIMEOUT, HEALTH_INTERVAL)
    }

    /// Manager with custom graceful/health timing (tests).
    pub fn with_timeouts(
        tracker: Arc<dyn ProcessTracker>,
        graceful_timeout: Duration,
        health_interval: Duration,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            procs: RwLock::new(HashMap::new()),
            tracker,
            failed: Arc::new(AtomicU64::new(0)),
            shutting_down: AtomicBool::new(false),
            shutdown_started: AtomicBool::new(false),
            health_cancel: CancellationToken::new(),
            health_task: Mutex::new(None),
            tasks: TaskTracker::new(),
            graceful_timeout,
        });
        manager.spawn_health_loop(health_interval);
        manager
    }

    fn spawn_health_loop(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let cancel = self.health_cancel.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let Some(manager) = weak.upgrade() else { break };
                        for proc in manager.snapshot() {
                            proc.health_scan();
                        }
                    }
                }
            }
        });
        *self.health_task.lock() = Some(handle);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Total Failed transitions (spawn failures, nonzero exits, zombies).
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Construct a process owned by this manager without starting it.
    pub fn build(&self, config: ProcessConfig) -> Arc<ManagedProcess> {
        Arc::new(
            ManagedProcess::new(config, Arc::clone(&self.tracker), Arc::clone(&self.failed))
                .with_graceful_timeout(self.graceful_timeout),
        )
    }

    /// Add a process to the registry. Refuses duplicates and refuses
    /// everything once shutdown has begun.
    pub fn register(&self, proc: Arc<ManagedProcess>) -> Result<(), ProcError> {
        if self.is_shutting_down() {
            return Err(ProcError::ShuttingDown);
        }
        let mut procs = self.procs.write();
        if procs.contains_key(proc.id()) {
            return Err(ProcError::DuplicateId(proc.id().clone()));
        }
        procs.insert(proc.id().clone(), proc);
        Ok(())
    }

    /// Register and spawn. Registration is rolled back when the spawn
    /// fails so the ID is reusable.
    pub fn start(
        &self,
        proc: Arc<ManagedProcess>,
        cancel: &CancellationToken,
    ) -> Result<(), ProcError> {
        self.register(Arc::clone(&proc))?;
        if let Err(e) = proc.start(&self.tasks, cancel) {
            self.procs.write().remove(proc.id());
            return Err(e);
        }
        Ok(())
    }

    /// Convenience constructor + start.
    pub fn start_command(
        &self,
        config: ProcessConfig,
        cancel: &CancellationToken,
    ) -> Result<Arc<ManagedProcess>, ProcError> {
        let proc = self.build(config);
        self.start(Arc::clone(&proc), cancel)?;
        Ok(proc)
    }

    /// Start and await completion. On cancellation (or the config's
    /// request timeout) the child is stopped and `Cancelled` returned.
    /// The registry entry is removed once the run finishes.
    pub async fn run_sync(
        &self,
        config: ProcessConfig,
        cancel: &CancellationToken,
    ) -> Result<ProcessInfo, ProcError> {
        let request_timeout = config.request_timeout;
        let proc = self.start_command(config, cancel)?;

        let outcome = async {
            tokio::select! {
                _ = proc.wait_done() => Ok(()),
                _ = cancel.cancelled() => Err(ProcError::Cancelled),
            }
        };
        let result = match request_timeout {
            Some(limit) => match tokio::time::timeout(limit, outcome).await {
                Ok(r) => r,
                Err(_) => Err(ProcError::Cancelled),
            },
            None => outcome.await,
        };

        if let Err(e) = result {
            let _ = proc.stop(cancel).await;
            self.procs.write().remove(proc.id());
            return Err(e);
        }

        let info = proc.info();
        self.procs.write().remove(proc.id());
        Ok(info)
    }

    /// Exact lookup. Fuzzy lookup is deliberately not exposed for
    /// processes: IDs are user-chosen.
    pub fn get(&self, id: &str) -> Option<Arc<ManagedProcess>> {
        self.procs.read().get(id).cloned()
    }

    pub async fn stop(&self, id: &str, cancel: &CancellationToken) -> Result<(), ProcError> {
        let proc = self.get(id).ok_or_else(|| ProcError::NotFound(ProcessId::new(id)))?;
        proc.stop(cancel).await
    }

    pub async fn stop_process(
        &self,
        proc: &ManagedProcess,
        cancel: &CancellationToken,
    ) -> Result<(), ProcError> {
        proc.stop(cancel).await
    }

    /// Stop, deregister, rebuild from the original config, start.
    pub async fn restart(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<ManagedProcess>, ProcError> {
        if self.is_shutting_down() {
            return Err(ProcError::ShuttingDown);
        }
        let proc = self.get(id).ok_or_else(|| ProcError::NotFound(ProcessId::new(id)))?;
        proc.stop(cancel).await?;
        self.procs.write().remove(proc.id());

        let rebuilt = self.build(proc.config().clone());
        self.start(Arc::clone(&rebuilt), cancel)?;
        info!(id = %rebuilt.id(), "process restarted");
        Ok(rebuilt)
    }

    /// Drop a terminal process from the registry.
    pub fn remove(&self, id: &str) -> Result<(), ProcError> {
        let mut procs = self.procs.write();
        let Some(proc) = procs.get(id) else {
            return Err(ProcError::NotFound(ProcessId::new(id)));
        };
        let state = proc.state();
        if !state.is_terminal() {
            return Err(ProcError::NotTerminal { id: proc.id().clone(), state });
        }
        procs.remove(id);
        Ok(())
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        self.snapshot().iter().map(|p| p.info()).collect()
    }

    /// Snapshot filtered by project path, for session scoping.
    pub fn list_by_path(&self, path: &Path) -> Vec<ProcessInfo> {
        self.snapshot()
            .iter()
            .filter(|p| p.config().project_path == path)
            .map(|p| p.info())
            .collect()
    }

    /// Best-effort parallel stop of every process belonging to a
    /// project. Stopped processes are dropped from the registry; errors
    /// are collected, not short-circuited.
    pub async fn stop_by_project_path(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), JoinedErrors> {
        let targets: Vec<Arc<ManagedProcess>> = self
            .snapshot()
            .into_iter()
            .filter(|p| p.config().project_path == path)
            .collect();
        debug!(path = %path.display(), count = targets.len(), "stopping processes for project");

        let errors = self.stop_all(targets, cancel).await;
        JoinedErrors::from_results(errors)
    }

    /// Idempotent full shutdown: stop the health loop, stop every
    /// process in parallel, then await the waiter tasks bounded by
    /// `cancel`.
    pub async fn shutdown(&self, cancel: &CancellationToken) -> Result<(), ProcError> {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutting_down.store(true, Ordering::SeqCst);
        self.health_cancel.cancel();
        let health = self.health_task.lock().take();
        if let Some(handle) = health {
            let _ = handle.await;
        }

        let targets = self.snapshot();
        info!(count = targets.len(), "process manager shutting down");
        let errors = self.stop_all(targets, cancel).await;

        self.tasks.close();
        // An expired token still gets a short drain window: force-killed
        // children reap in ~100ms and their waiters should be allowed to
        // land instead of reporting a spurious Cancelled.
        let wait = self.tasks.wait();
        tokio::pin!(wait);
        tokio::select! {
            biased;
            _ = &mut wait => {}
            _ = cancel.cancelled() => {
                if tokio::time::timeout(Duration::from_millis(250), &mut wait).await.is_err() {
                    return Err(ProcError::Cancelled);
                }
            }
        }

        JoinedErrors::from_results(errors)?;
        Ok(())
    }

    async fn stop_all(
        &self,
        targets: Vec<Arc<ManagedProcess>>,
        cancel: &CancellationToken,
    ) -> Vec<(String, String)> {
        let stops = targets.iter().map(|proc| {
            let proc = Arc::clone(proc);
            let cancel = cancel.clone();
            async move { (proc.id().clone(), proc.stop(&cancel).await) }
        });

        let mut errors = Vec::new();
        for (id, result) in join_all(stops).await {
            match result {
                Ok(()) => {
                    self.procs.write().remove(&id);
                }
                Err(e) => errors.push((id.to_string(), e.to_string())),
            }
        }
        errors
    }

    fn snapshot(&self) -> Vec<Arc<ManagedProcess>> {
        self.procs.read().values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
