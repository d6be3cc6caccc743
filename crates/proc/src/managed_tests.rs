// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use devtool_tracker::MemoryTracker;
use std::time::Instant;

struct Harness {
    tracker: Arc<MemoryTracker>,
    failed: Arc<AtomicU64>,
    tasks: TaskTracker,
}

impl Harness {
    fn new() -> Self {
        Self {
            tracker: Arc::new(MemoryTracker::new()),
            failed: Arc::new(AtomicU64::new(0)),
            tasks: TaskTracker::new(),
        }
    }

    fn build(&self, config: ProcessConfig) -> Arc<ManagedProcess> {
        Arc::new(
            ManagedProcess::new(config, self.tracker.clone(), self.failed.clone())
                .with_graceful_timeout(Duration::from_millis(500)),
        )
    }

    async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

fn sh(id: &str, script: &str) -> ProcessConfig {
    ProcessConfig::new(id, std::env::temp_dir(), "sh").with_args(&["-c", script])
}

fn sleep_cfg(id: &str, secs: u32) -> ProcessConfig {
    ProcessConfig::new(id, std::env::temp_dir(), "sleep")
        .with_args(&[&secs.to_string()])
}

#[tokio::test]
async fn clean_exit_reaches_stopped() {
    let h = Harness::new();
    let proc = h.build(sh("ok", "printf hello"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    assert!(proc.pid().is_some());

    proc.wait_done().await;
    h.drain().await;

    assert_eq!(proc.state(), ProcessState::Stopped);
    assert_eq!(proc.exit_code(), Some(Some(0)));
    let (bytes, truncated) = proc.stdout().snapshot();
    assert_eq!(bytes, b"hello");
    assert!(!truncated);
    assert_eq!(h.failed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn nonzero_exit_reaches_failed() {
    let h = Harness::new();
    let proc = h.build(sh("bad", "exit 3"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    proc.wait_done().await;
    h.drain().await;

    assert_eq!(proc.state(), ProcessState::Failed);
    assert_eq!(proc.exit_code(), Some(Some(3)));
    assert_eq!(h.failed.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn stderr_is_captured_separately() {
    let h = Harness::new();
    let proc = h.build(sh("err", "printf out; printf oops >&2"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    proc.wait_done().await;
    h.drain().await;

    assert_eq!(proc.stdout().snapshot().0, b"out");
    assert_eq!(proc.stderr().snapshot().0, b"oops");
}

#[tokio::test]
async fn spawn_failure_reverts_to_failed() {
    let h = Harness::new();
    let proc = h.build(ProcessConfig::new(
        "ghost",
        std::env::temp_dir(),
        "/nonexistent/definitely-not-a-binary",
    ));
    let err = proc.start(&h.tasks, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, ProcError::Spawn { .. }));
    assert_eq!(proc.state(), ProcessState::Failed);
    assert!(proc.pid().is_none());
    assert_eq!(h.failed.load(Ordering::Relaxed), 1);
    // The done latch closes so stop() callers never hang.
    proc.wait_done().await;
}

#[tokio::test]
async fn double_start_is_a_state_conflict() {
    let h = Harness::new();
    let proc = h.build(sleep_cfg("dup", 5));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    let err = proc.start(&h.tasks, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, ProcError::InvalidState { .. }));

    proc.stop(&CancellationToken::new()).await.unwrap();
    h.drain().await;
}

#[tokio::test]
async fn stop_before_start_is_a_state_conflict() {
    let h = Harness::new();
    let proc = h.build(sleep_cfg("early", 1));
    let err = proc.stop(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ProcError::InvalidState { .. }));
}

#[tokio::test]
async fn stop_terminates_promptly() {
    let h = Harness::new();
    let proc = h.build(sleep_cfg("term", 10));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();

    let started = Instant::now();
    proc.stop(&CancellationToken::new()).await.unwrap();
    // sleep(1) honors SIGTERM, so the graceful path finishes fast.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(proc.state(), ProcessState::Failed);
    assert_eq!(proc.exit_code(), Some(None));
    h.drain().await;
}

#[tokio::test]
async fn stop_force_kills_a_term_ignoring_child() {
    let h = Harness::new();
    // The child traps TERM, so only the force-kill ends it.
    let proc = h.build(sh("stubborn", "trap '' TERM; sleep 10"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    // Give the shell a moment to install the trap.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let started = Instant::now();
    proc.stop(&CancellationToken::new()).await.unwrap();
    let elapsed = started.elapsed();
    // Graceful budget is 500ms in tests; the kill follows right after.
    assert!(elapsed >= Duration::from_millis(400), "stopped too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "stop took {:?}", elapsed);

    proc.wait_done().await;
    assert_eq!(proc.state(), ProcessState::Failed);
    h.drain().await;
}

#[tokio::test]
async fn cancelled_token_skips_graceful_wait() {
    let h = Harness::new();
    let proc = h.build(sh("fast", "trap '' TERM; sleep 10"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let started = Instant::now();
    proc.stop(&cancel).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    proc.wait_done().await;
    assert_eq!(proc.state(), ProcessState::Failed);
    h.drain().await;
}

#[tokio::test]
async fn stop_is_a_noop_on_terminal_process() {
    let h = Harness::new();
    let proc = h.build(sh("done", "true"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    proc.wait_done().await;
    proc.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(proc.state(), ProcessState::Stopped);
    h.drain().await;
}

#[tokio::test]
async fn concurrent_stops_converge() {
    let h = Harness::new();
    let proc = h.build(sleep_cfg("race", 10));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();

    let cancel_a = CancellationToken::new();
    let cancel_b = CancellationToken::new();
    let (a, b) = tokio::join!(proc.stop(&cancel_a), proc.stop(&cancel_b),);
    a.unwrap();
    b.unwrap();
    assert!(proc.state().is_terminal());
    h.drain().await;
}

#[tokio::test]
async fn tracker_sees_add_and_remove() {
    let h = Harness::new();
    let proc = h.build(sleep_cfg("tracked", 5));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    assert_eq!(h.tracker.tracked_ids(), vec!["tracked".to_string()]);

    proc.stop(&CancellationToken::new()).await.unwrap();
    proc.wait_done().await;
    h.drain().await;
    assert!(h.tracker.tracked_ids().is_empty());
}

#[tokio::test]
async fn health_scan_marks_dead_pid_zombie() {
    let h = Harness::new();
    let proc = h.build(sleep_cfg("zombie", 1));
    // Running state with a pid the OS does not know.
    proc.test_force_running(4_500_000);

    assert!(proc.health_scan());
    assert_eq!(proc.state(), ProcessState::Zombie);
    assert_eq!(h.failed.load(Ordering::Relaxed), 1);
    // Tracker removal is deferred to stop/remove.
    proc.wait_done().await;

    // A second scan is a no-op.
    assert!(!proc.health_scan());
    assert_eq!(h.failed.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn detected_url_appears_in_info() {
    let h = Harness::new();
    let proc = h.build(sh("web", "echo 'ready on http://localhost:5199'; sleep 5"));
    proc.start(&h.tasks, &CancellationToken::new()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while proc.detected_url().is_none() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(proc.detected_url().as_deref(), Some("http://localhost:5199"));
    assert_eq!(proc.info().detected_url.as_deref(), Some("http://localhost:5199"));

    proc.stop(&CancellationToken::new()).await.unwrap();
    h.drain().await;
}

#[tokio::test]
async fn info_snapshot_is_consistent() {
    let h = Harness::new();
    let config = sleep_cfg("info", 5).with_label("role", "dev-server");
    let proc = h.build(config);
    let info = proc.info();
    assert_eq!(info.state, ProcessState::Pending);
    assert!(info.pid.is_none());
    assert!(info.started_at.is_none());

    proc.start(&h.tasks, &CancellationToken::new()).unwrap();
    let info = proc.info();
    assert_eq!(info.state, ProcessState::Running);
    assert!(info.pid.is_some());
    assert!(info.started_at.is_some());
    assert!(info.ended_at.is_none());
    assert_eq!(info.labels.get("role").map(String::as_str), Some("dev-server"));

    proc.stop(&CancellationToken::new()).await.unwrap();
    proc.wait_done().await;
    let info = proc.info();
    assert!(info.ended_at.is_some());
    h.drain().await;
}
