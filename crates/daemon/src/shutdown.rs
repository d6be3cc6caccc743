// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown coordination: signals, modes, fan-out.
//!
//! The first trigger (signal or RPC) wins; later triggers await the
//! first. A deadline under the aggressive threshold cancels the root
//! token up front so every child skips its graceful wait and
//! force-kills immediately. Subordinate failures are joined and logged;
//! only an exceeded deadline with live resources makes the daemon exit
//! nonzero.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devtool_proc::{ProcError, ProcessManager};
use devtool_proxy::{ProxyError, ProxyManager};
use devtool_tracker::ProcessTracker;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::supervisor::Supervisor;

/// Deadlines below this run in aggressive mode.
pub const AGGRESSIVE_THRESHOLD: Duration = Duration::from_secs(3);

/// Overall deadline when the caller does not supply one.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown deadline exceeded with live resources")]
    DeadlineExceeded,
}

/// Outcome recorded for late observers (the daemon main loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    DeadlineExceeded,
}

pub struct ShutdownCoordinator {
    supervisor: Arc<Supervisor>,
    procs: Arc<ProcessManager>,
    proxies: Arc<ProxyManager>,
    tracker: Arc<dyn ProcessTracker>,
    once: AtomicBool,
    outcome_tx: watch::Sender<Option<ShutdownOutcome>>,
}

impl ShutdownCoordinator {
    pub fn new(
        supervisor: Arc<Supervisor>,
        procs: Arc<ProcessManager>,
        proxies: Arc<ProxyManager>,
        tracker: Arc<dyn ProcessTracker>,
    ) -> Arc<Self> {
        let (outcome_tx, _) = watch::channel(None);
        Arc::new(Self { supervisor, procs, proxies, tracker, once: AtomicBool::new(false), outcome_tx })
    }

    /// Install SIGINT/SIGTERM handlers that trigger shutdown with the
    /// default deadline. Repeat signals collapse into the first run.
    #[cfg(unix)]
    pub fn install_signal_handlers(self: &Arc<Self>) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
                info!(signal = name, "shutdown signal received");
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let _ = coordinator.trigger(None).await;
                });
            }
        });
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install_signal_handlers(self: &Arc<Self>) -> std::io::Result<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = coordinator.trigger(None).await;
            }
        });
        Ok(())
    }

    /// Resolves once some trigger has completed.
    pub async fn wait_finished(&self) -> ShutdownOutcome {
        let mut rx = self.outcome_tx.subscribe();
        loop {
            if let Some(outcome) = *rx.borrow() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return ShutdownOutcome::Clean;
            }
        }
    }

    /// Run the shutdown. The first caller does the work; everyone else
    /// awaits their outcome.
    pub async fn trigger(&self, deadline: Option<Duration>) -> Result<(), ShutdownError> {
        if self.once.swap(true, Ordering::SeqCst) {
            return match self.wait_finished().await {
                ShutdownOutcome::Clean => Ok(()),
                ShutdownOutcome::DeadlineExceeded => Err(ShutdownError::DeadlineExceeded),
            };
        }

        let deadline = deadline.unwrap_or_else(crate::env::shutdown_deadline);
        let aggressive = deadline < AGGRESSIVE_THRESHOLD;
        info!(?deadline, aggressive, "shutdown started");

        self.supervisor.mark_shutting_down();

        let cancel = self.supervisor.root_cancel().child_token();
        if aggressive {
            // Children see an expired token and force-kill immediately.
            cancel.cancel();
        }
        let deadline_timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        let (proc_result, proxy_result) =
            tokio::join!(self.procs.shutdown(&cancel), self.proxies.shutdown(&cancel));
        deadline_timer.abort();

        // The PID file is cleared once every child is down; a daemon
        // crash before this point leaves the sweep material in place.
        if let Err(e) = self.tracker.clear() {
            warn!(error = %e, "pid file clear failed");
        }

        let mut deadline_exceeded = false;
        for result in [proc_result.map_err(Sub::Proc), proxy_result.map_err(Sub::Proxy)] {
            match result {
                Ok(()) => {}
                Err(Sub::Proc(ProcError::Cancelled)) | Err(Sub::Proxy(ProxyError::Cancelled)) => {
                    deadline_exceeded = true;
                }
                Err(Sub::Proc(e)) => error!(error = %e, "process shutdown incomplete"),
                Err(Sub::Proxy(e)) => error!(error = %e, "proxy shutdown incomplete"),
            }
        }

        let outcome = if deadline_exceeded {
            ShutdownOutcome::DeadlineExceeded
        } else {
            ShutdownOutcome::Clean
        };
        info!(?outcome, "shutdown finished");
        let _ = self.outcome_tx.send(Some(outcome));

        match outcome {
            ShutdownOutcome::Clean => Ok(()),
            ShutdownOutcome::DeadlineExceeded => Err(ShutdownError::DeadlineExceeded),
        }
    }
}

/// Tags subordinate results so one match arm covers both managers.
enum Sub {
    Proc(ProcError),
    Proxy(ProxyError),
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
