// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One supervised child process.
//!
//! The state machine lives on an atomic cell, stdio streams into ring
//! buffers via pump tasks, and a waiter task reaps the child and closes
//! the done latch. On POSIX every child leads its own process group, so
//! terminate/force-kill signal the whole group and descendants cannot
//! escape. Non-unix builds fall back to killing the direct child handle.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use devtool_core::{ProcessId, ProcessState, ProcessStateCell, RingBuffer};
use devtool_tracker::{os, ProcessTracker, TrackedProcess};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::{watch, Notify};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ProcessConfig;
use crate::error::ProcError;
use crate::urldetect::UrlDetector;

/// Wall-clock budget between terminate and force-kill.
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(5);

/// Short reap wait after a force-kill.
const FORCE_KILL_REAP_WAIT: Duration = Duration::from_millis(100);

/// Snapshot of a process for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub command: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
    pub project_path: PathBuf,
    pub labels: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub detected_url: Option<String>,
}

/// A supervised child process.
pub struct ManagedProcess {
    config: ProcessConfig,
    state: ProcessStateCell,
    stdout: RingBuffer,
    stderr: RingBuffer,
    pid: OnceLock<u32>,
    pgid: OnceLock<u32>,
    exit_code: OnceLock<Option<i32>>,
    created_at: DateTime<Utc>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
    detected_url: Mutex<Option<String>>,
    done_tx: watch::Sender<bool>,
    /// Non-unix force-kill path: wakes the waiter to `start_kill`.
    kill_notify: Notify,
    tracker: Arc<dyn ProcessTracker>,
    failed_counter: Arc<AtomicU64>,
    graceful_timeout: Duration,
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("config", &self.config)
            .field("state", &self.state.load())
            .field("pid", &self.pid.get())
            .field("pgid", &self.pgid.get())
            .field("exit_code", &self.exit_code.get())
            .finish()
    }
}

impl ManagedProcess {
    pub fn new(
        config: ProcessConfig,
        tracker: Arc<dyn ProcessTracker>,
        failed_counter: Arc<AtomicU64>,
    ) -> Self {
        let (done_tx, _) = watch::channel(false);
        let ring_capacity = config.ring_capacity;
        Self {
            stdout: RingBuffer::new(ring_capacity),
            stderr: RingBuffer::new(ring_capacity),
            config,
            state: ProcessStateCell::default(),
            pid: OnceLock::new(),
            pgid: OnceLock::new(),
            exit_code: OnceLock::new(),
            created_at: Utc::now(),
            started_at: Mutex::new(None),
            ended_at: Mutex::new(None),
            detected_url: Mutex::new(None),
            done_tx,
            kill_notify: Notify::new(),
            tracker,
            failed_counter,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
        }
    }

    /// Override the terminate→force-kill budget (tests).
    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    pub fn id(&self) -> &ProcessId {
        &self.config.id
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessState {
        self.state.load()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    pub fn pgid(&self) -> Option<u32> {
        self.pgid.get().copied()
    }

    /// Exit code once reaped. `Some(None)` means killed by signal.
    pub fn exit_code(&self) -> Option<Option<i32>> {
        self.exit_code.get().copied()
    }

    pub fn stdout(&self) -> &RingBuffer {
        &self.stdout
    }

    pub fn stderr(&self) -> &RingBuffer {
        &self.stderr
    }

    pub fn detected_url(&self) -> Option<String> {
        self.detected_url.lock().clone()
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.config.id.clone(),
            state: self.state.load(),
            pid: self.pid(),
            exit_code: self.exit_code().flatten(),
            command: self.config.command.clone(),
            args: self.config.args.clone(),
            dir: self.config.dir.clone(),
            project_path: self.config.project_path.clone(),
            labels: self.config.labels.clone(),
            created_at: self.created_at,
            started_at: *self.started_at.lock(),
            ended_at: *self.ended_at.lock(),
            detected_url: self.detected_url(),
        }
    }

    /// Spawn the child and move to Running.
    ///
    /// Pump and waiter tasks are spawned through `tasks` so the manager's
    /// shutdown can await every live waiter.
    pub fn start(
        self: &Arc<Self>,
        tasks: &TaskTracker,
        cancel: &CancellationToken,
    ) -> Result<(), ProcError> {
        if cancel.is_cancelled() {
            return Err(ProcError::Cancelled);
        }
        self.state
            .transition(ProcessState::Pending, ProcessState::Starting)
            .map_err(|source| ProcError::InvalidState { id: self.config.id.clone(), source })?;

        let mut cmd = build_command(&self.config);
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state.force(ProcessState::Failed);
                self.failed_counter.fetch_add(1, Ordering::Relaxed);
                *self.ended_at.lock() = Some(Utc::now());
                let _ = self.done_tx.send(true);
                return Err(ProcError::Spawn { id: self.config.id.clone(), source });
            }
        };

        let pid = child.id().unwrap_or_default();
        let _ = self.pid.set(pid);
        // process_group(0) makes the child its own group leader.
        let _ = self.pgid.set(pid);
        *self.started_at.lock() = Some(Utc::now());

        if let Err(conflict) = self.state.transition(ProcessState::Starting, ProcessState::Running)
        {
            warn!(id = %self.config.id, %conflict, "unexpected state after spawn");
        }

        // Best-effort: the process runs even when tracking fails.
        let entry = TrackedProcess {
            id: self.config.id.to_string(),
            pid,
            pgid: pid,
            project_path: self.config.project_path.clone(),
            started_at: Utc::now(),
        };
        if let Err(e) = self.tracker.add(entry) {
            warn!(id = %self.config.id, error = %e, "pid tracking failed, process continues");
        }

        info!(id = %self.config.id, pid, command = %self.config.command, "process started");

        if let Some(stdout) = child.stdout.take() {
            let proc = Arc::clone(self);
            tasks.spawn(async move { proc.pump_stdout(stdout).await });
        }
        if let Some(stderr) = child.stderr.take() {
            let ring = self.stderr.clone();
            tasks.spawn(async move { pump(ring, stderr).await });
        }
        let proc = Arc::clone(self);
        tasks.spawn(async move { proc.waiter(child).await });

        Ok(())
    }

    /// Stop the child: terminate, wait for the graceful budget, then
    /// force-kill. No-op in terminal states. An already-cancelled token
    /// skips the graceful path entirely.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), ProcError> {
        if self.state.load().is_terminal() {
            return Ok(());
        }

        if let Err(conflict) =
            self.state.transition(ProcessState::Running, ProcessState::Stopping)
        {
            let actual = self.state.load();
            if actual.is_terminal() {
                return Ok(());
            }
            if actual == ProcessState::Stopping {
                // Another caller is already stopping; await their outcome.
                return self.await_done(cancel).await;
            }
            return Err(ProcError::InvalidState { id: self.config.id.clone(), source: conflict });
        }

        if cancel.is_cancelled() {
            self.force_kill();
            let _ = timeout(FORCE_KILL_REAP_WAIT, self.wait_done()).await;
            return Ok(());
        }

        self.send_terminate();
        tokio::select! {
            _ = self.wait_done() => return Ok(()),
            _ = tokio::time::sleep(self.graceful_timeout) => {
                debug!(id = %self.config.id, "graceful timeout elapsed, force-killing");
            }
            _ = cancel.cancelled() => {
                debug!(id = %self.config.id, "stop cancelled, force-killing");
            }
        }

        self.force_kill();
        let _ = timeout(FORCE_KILL_REAP_WAIT, self.wait_done()).await;
        Ok(())
    }

    /// Periodic liveness probe. Returns true when the process was found
    /// dead without a reap and moved to Zombie. The tracker entry stays
    /// until removal so a daemon restart can still sweep the group.
    #[cfg(unix)]
    pub fn health_scan(&self) -> bool {
        if self.state.load() != ProcessState::Running {
            return false;
        }
        let Some(pid) = self.pid.get() else {
            return false;
        };
        if os::is_alive(*pid) {
            return false;
        }
        if self.state.transition(ProcessState::Running, ProcessState::Zombie).is_ok() {
            warn!(id = %self.config.id, pid = *pid, "process vanished without reap, marking zombie");
            self.failed_counter.fetch_add(1, Ordering::Relaxed);
            *self.ended_at.lock() = Some(Utc::now());
            let _ = self.done_tx.send(true);
            return true;
        }
        false
    }

    /// No liveness probe without a process-table capability.
    #[cfg(not(unix))]
    pub fn health_scan(&self) -> bool {
        false
    }

    /// Resolves once the waiter has reaped the child (or the process
    /// never got past spawning).
    pub async fn wait_done(&self) {
        let mut rx = self.done_tx.subscribe();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn await_done(&self, cancel: &CancellationToken) -> Result<(), ProcError> {
        tokio::select! {
            _ = self.wait_done() => Ok(()),
            _ = cancel.cancelled() => Err(ProcError::Cancelled),
        }
    }

    fn send_terminate(&self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.pgid.get() {
                if let Err(e) = os::terminate_group(*pgid) {
                    debug!(id = %self.config.id, error = %e, "terminate signal failed");
                }
                return;
            }
        }
        self.kill_notify.notify_one();
    }

    fn force_kill(&self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.pgid.get() {
                if let Err(e) = os::kill_group(*pgid) {
                    debug!(id = %self.config.id, error = %e, "kill signal failed");
                }
                return;
            }
        }
        self.kill_notify.notify_one();
    }

    async fn waiter(self: Arc<Self>, mut child: tokio::process::Child) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = self.kill_notify.notified() => {
                let _ = child.start_kill();
                child.wait().await
            }
        };

        let (code, success) = match &status {
            Ok(st) => (st.code(), st.success()),
            Err(e) => {
                warn!(id = %self.config.id, error = %e, "wait failed");
                (None, false)
            }
        };

        let _ = self.exit_code.set(code);
        *self.ended_at.lock() = Some(Utc::now());

        let target = if success { ProcessState::Stopped } else { ProcessState::Failed };
        let transitioned = self
            .state
            .transition(ProcessState::Stopping, target)
            .or_else(|_| self.state.transition(ProcessState::Running, target))
            .is_ok();
        if transitioned && target == ProcessState::Failed {
            self.failed_counter.fetch_add(1, Ordering::Relaxed);
        }

        if let Err(e) = self.tracker.remove(self.config.id.as_str()) {
            warn!(id = %self.config.id, error = %e, "pid untracking failed");
        }

        info!(id = %self.config.id, exit_code = ?code, state = %self.state.load(), "process exited");
        let _ = self.done_tx.send(true);
    }

    async fn pump_stdout(self: Arc<Self>, mut stdout: tokio::process::ChildStdout) {
        let mut detector = UrlDetector::new(&self.config.url_matchers);
        let mut buf = [0u8; 8192];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    self.stdout.write(&buf[..n]);
                    if let Some(url) = detector.feed(&buf[..n]) {
                        info!(id = %self.config.id, %url, "detected dev server url");
                        *self.detected_url.lock() = Some(url);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
impl ManagedProcess {
    /// Put the cell in Running with a fixed pid, bypassing spawn.
    pub(crate) fn test_force_running(&self, pid: u32) {
        let _ = self.pid.set(pid);
        let _ = self.pgid.set(pid);
        self.state.force(ProcessState::Running);
    }
}

async fn pump(ring: RingBuffer, mut reader: tokio::process::ChildStderr) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => ring.write(&buf[..n]),
        }
    }
}

fn build_command(config: &ProcessConfig) -> tokio::process::Command {
    let mut cmd = std::process::Command::new(&config.command);
    cmd.args(&config.args);
    cmd.current_dir(&config.dir);
    for (k, v) in &config.env {
        cmd.env(k, v);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Each child leads its own process group; group signals reap
        // every descendant without touching the daemon.
        cmd.process_group(0);
    }
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

#[cfg(test)]
#[path = "managed_tests.rs"]
mod tests;
