// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs: aggressive shutdown, graceful stop, orphan
//! recovery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use devtool_core::ProcessState;
use devtool_daemon::lifecycle::{startup, Config};
use devtool_daemon::{ShutdownCoordinator, Supervisor};
use devtool_proc::{ProcessConfig, ProcessManager};
use devtool_proxy::ProxyManager;
use devtool_tracker::{FileTracker, ProcessTracker};

fn config_in(dir: &tempfile::TempDir) -> Config {
    Config {
        state_dir: dir.path().to_path_buf(),
        socket_path: dir.path().join("devtool-mcp.sock"),
        lock_path: dir.path().join("daemon.pid"),
        tracking_path: dir.path().join("pids.json"),
        log_path: dir.path().join("daemon.log"),
    }
}

struct Daemonish {
    supervisor: Arc<Supervisor>,
    coordinator: Arc<ShutdownCoordinator>,
    tracker: Arc<FileTracker>,
}

fn wire(tracker: Arc<FileTracker>) -> Daemonish {
    let shared: Arc<dyn ProcessTracker> = tracker.clone();
    let procs = ProcessManager::new(shared);
    let proxies = ProxyManager::new();
    let supervisor = Supervisor::new(Arc::clone(&procs), Arc::clone(&proxies));
    let coordinator =
        ShutdownCoordinator::new(Arc::clone(&supervisor), procs, proxies, tracker.clone());
    Daemonish { supervisor, coordinator, tracker }
}

fn sleep_cfg(id: &str, secs: u32) -> ProcessConfig {
    ProcessConfig::new(id, std::env::temp_dir(), "sleep").with_args(&[&secs.to_string()])
}

/// Ctrl+C with a 2s deadline while `sleep 60` runs: the
/// child is signal-killed promptly, shutdown reports clean, and the
/// PID file is cleared.
#[tokio::test]
async fn aggressive_shutdown_kills_sleep_and_clears_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let d = wire(Arc::new(FileTracker::new(dir.path().join("pids.json"))));
    let project = dir.path().to_path_buf();

    let info = d.supervisor.start_process(&project, sleep_cfg("sleeper", 60)).await.unwrap();
    assert_eq!(info.state, ProcessState::Running);
    assert_eq!(d.tracker.load().unwrap().processes.len(), 1);

    let proc = d.supervisor.procs().get("sleeper").unwrap();
    let started = Instant::now();
    d.coordinator.trigger(Some(Duration::from_secs(2))).await.unwrap();
    let elapsed = started.elapsed();

    // Aggressive mode: no graceful wait, the group is killed at once.
    assert!(elapsed < Duration::from_millis(1500), "shutdown took {:?}", elapsed);
    assert_eq!(proc.state(), ProcessState::Failed);
    assert_eq!(proc.exit_code(), Some(None));

    let doc = d.tracker.load().unwrap();
    assert!(doc.processes.is_empty());
}

/// Graceful stop of a sleeping child: `sleep` honors
/// SIGTERM, so the graceful path finishes well inside the 5s budget
/// with a signal exit.
#[tokio::test]
async fn graceful_stop_terminates_with_signal_exit() {
    let dir = tempfile::tempdir().unwrap();
    let d = wire(Arc::new(FileTracker::new(dir.path().join("pids.json"))));
    let project = dir.path().to_path_buf();

    d.supervisor.start_process(&project, sleep_cfg("naptime", 10)).await.unwrap();
    let proc = d.supervisor.procs().get("naptime").unwrap();

    let started = Instant::now();
    d.supervisor.stop_process(&project, "naptime").await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));

    proc.wait_done().await;
    assert_eq!(proc.state(), ProcessState::Failed);
    // Killed by signal: no exit code.
    assert_eq!(proc.exit_code(), Some(None));

    d.coordinator.trigger(Some(Duration::from_secs(10))).await.unwrap();
}

/// A PID file left by daemon 99999 points at a live
/// child. A new daemon's startup sweep kills it and rewrites the file.
#[cfg(unix)]
#[tokio::test]
async fn startup_orphan_sweep_reaps_previous_daemons_children() {
    use std::os::unix::process::CommandExt;

    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let mut cmd = std::process::Command::new("sleep");
    cmd.arg("100").process_group(0);
    let mut child = cmd.spawn().unwrap();
    let pid = child.id();

    let seeded = serde_json::json!({
        "daemon_pid": 99999,
        "updated_at": "2026-01-01T00:00:00Z",
        "processes": [{
            "id": "orphan",
            "pid": pid,
            "pgid": pid,
            "project_path": dir.path(),
            "started_at": "2026-01-01T00:00:00Z",
        }],
    });
    std::fs::write(&config.tracking_path, serde_json::to_vec(&seeded).unwrap()).unwrap();

    let result = startup(&config).await.unwrap();
    assert_eq!(result.orphans_killed, 1);

    // The orphan is dead and the file now belongs to this daemon.
    let status = child.wait().unwrap();
    assert!(!status.success());
    let doc = result.tracker.load().unwrap();
    assert_eq!(doc.daemon_pid, std::process::id());
    assert!(doc.processes.is_empty());
}
