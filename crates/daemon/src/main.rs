// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! devtoold: the devtool supervisor daemon.
//!
//! Exit codes: 0 on clean shutdown; nonzero only when the shutdown
//! deadline expired with resources still live.

use std::sync::Arc;

use devtool_daemon::listener::Listener;
use devtool_daemon::shutdown::ShutdownOutcome;
use devtool_daemon::{startup, Config, ShutdownCoordinator, Supervisor};
use devtool_proc::ProcessManager;
use devtool_proxy::ProxyManager;
use devtool_tracker::ProcessTracker;
use tracing::{error, info};

fn main() {
    let code = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(run()),
        Err(e) => {
            eprintln!("devtoold: runtime init failed: {}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> i32 {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("devtoold: {}", e);
            return 1;
        }
    };

    let _log_guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("devtoold: logging init failed: {}", e);
            return 1;
        }
    };

    let startup_result = match startup(&config).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("devtoold: {}", e);
            return 1;
        }
    };

    let tracker: Arc<dyn ProcessTracker> = startup_result.tracker.clone();
    let procs = ProcessManager::with_timeouts(
        Arc::clone(&tracker),
        devtool_daemon::env::graceful_timeout(),
        std::time::Duration::from_secs(10),
    );
    let proxies = ProxyManager::new();
    let supervisor = Supervisor::new(Arc::clone(&procs), Arc::clone(&proxies));
    let coordinator = ShutdownCoordinator::new(
        Arc::clone(&supervisor),
        Arc::clone(&procs),
        Arc::clone(&proxies),
        tracker,
    );

    if let Err(e) = coordinator.install_signal_handlers() {
        error!(error = %e, "signal handler install failed");
        eprintln!("devtoold: {}", e);
        return 1;
    }

    let listener_cancel = supervisor.root_cancel().child_token();
    let listener = Listener::new(
        startup_result.listener,
        Arc::clone(&supervisor),
        Arc::clone(&coordinator),
    );
    tokio::spawn(listener.run(listener_cancel));

    // Signals the wrapper that the socket is accepting commands.
    println!("READY");
    info!("devtoold running");

    let outcome = coordinator.wait_finished().await;
    let _ = std::fs::remove_file(&config.socket_path);

    match outcome {
        ShutdownOutcome::Clean => 0,
        ShutdownOutcome::DeadlineExceeded => {
            error!("exiting with live resources after deadline");
            1
        }
    }
}

/// File logging via tracing-appender; `DEVTOOL_LOG` filters.
fn init_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(&config.state_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_env("DEVTOOL_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
