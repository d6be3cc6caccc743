// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for socket I/O.
//!
//! Accepts connections on the Unix socket and handles each in a
//! spawned task. Every connection advertises its project path with
//! `HELLO` before starting resources; dropping the connection reaps
//! that session's processes and proxies.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use devtool_core::ErrorKind;
use devtool_proc::ProcessConfig;
use devtool_proxy::ProxyConfig;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::protocol::{self, ProtocolError, Request};
use crate::shutdown::ShutdownCoordinator;
use crate::supervisor::{Supervisor, SupervisorError};

pub struct Listener {
    unix: UnixListener,
    supervisor: Arc<Supervisor>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Listener {
    pub fn new(
        unix: UnixListener,
        supervisor: Arc<Supervisor>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self { unix, supervisor, coordinator }
    }

    /// Accept until cancelled, spawning a task per connection.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.unix.accept() => match accepted {
                    Ok((stream, _)) => {
                        let supervisor = Arc::clone(&self.supervisor);
                        let coordinator = Arc::clone(&self.coordinator);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            handle_connection(reader, writer, supervisor, coordinator).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }
    }
}

/// Per-connection session state: the advertised project path.
struct Session {
    project_path: Option<PathBuf>,
}

impl Session {
    fn project(&self) -> Result<&PathBuf, SupervisorError> {
        self.project_path.as_ref().ok_or(SupervisorError {
            kind: ErrorKind::StateConflict,
            reason: "no project path; send HELLO first".to_string(),
        })
    }
}

async fn handle_connection<R, W>(
    reader: R,
    mut writer: W,
    supervisor: Arc<Supervisor>,
    coordinator: Arc<ShutdownCoordinator>,
) where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut session = Session { project_path: None };

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        let (response, shutdown) = match protocol::parse_line(&line) {
            Ok(request) => {
                let shutdown = matches!(request, Request::Shutdown { .. });
                let response = dispatch(request, &mut session, &supervisor, &coordinator).await;
                (response, shutdown)
            }
            Err(e) => (render_protocol_error(e), false),
        };

        if writer.write_all(response.as_bytes()).await.is_err() {
            break;
        }
        if shutdown {
            break;
        }
    }

    // Client gone: reap the session's resources.
    if let Some(path) = session.project_path.take() {
        supervisor.session_closed(&path).await;
    }
}

async fn dispatch(
    request: Request,
    session: &mut Session,
    supervisor: &Arc<Supervisor>,
    coordinator: &Arc<ShutdownCoordinator>,
) -> String {
    match request {
        Request::Hello { project_path } => {
            debug!(path = %project_path.display(), "session hello");
            session.project_path = Some(project_path);
            protocol::render_ok("hello")
        }
        Request::Ping => protocol::render_ok("pong"),

        Request::ProxyStart { id, target_url, port } => {
            let project = match session.project() {
                Ok(p) => p.clone(),
                Err(e) => return render_error(e),
            };
            let config = ProxyConfig::new(id, &project, target_url).with_port(port);
            match supervisor.start_proxy(&project, config).await {
                Ok(info) => protocol::render_ok(&format!("{} {}", info.id, info.listen_addr)),
                Err(e) => render_error(e),
            }
        }
        Request::ProxyStop { id } => {
            let project = match session.project() {
                Ok(p) => p.clone(),
                Err(e) => return render_error(e),
            };
            match supervisor.stop_proxy(&project, &id).await {
                Ok(()) => protocol::render_ok(&format!("{} stopped", id)),
                Err(e) => render_error(e),
            }
        }
        Request::ProxyList => {
            let infos = supervisor.list_proxies(session.project_path.as_deref());
            render_json(&infos)
        }

        Request::ProcStart { id, cwd, command } => {
            let project = match session.project() {
                Ok(p) => p.clone(),
                Err(e) => return render_error(e),
            };
            let Some((program, args)) = command.split_first() else {
                return protocol::render_err(ErrorKind::StateConflict, "empty command");
            };
            let mut config = ProcessConfig::new(id, cwd, program.clone());
            config.args = args.to_vec();
            match supervisor.start_process(&project, config).await {
                Ok(info) => {
                    let pid = info.pid.unwrap_or_default();
                    protocol::render_ok(&format!("{} pid {}", info.id, pid))
                }
                Err(e) => render_error(e),
            }
        }
        Request::ProcStop { id } => {
            let project = match session.project() {
                Ok(p) => p.clone(),
                Err(e) => return render_error(e),
            };
            match supervisor.stop_process(&project, &id).await {
                Ok(()) => protocol::render_ok(&format!("{} stopped", id)),
                Err(e) => render_error(e),
            }
        }
        Request::ProcList => {
            let infos = supervisor.list_processes(session.project_path.as_deref());
            render_json(&infos)
        }

        Request::Shutdown { deadline_ms } => {
            info!(deadline_ms, "shutdown requested over RPC");
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                let _ = coordinator.trigger(Some(Duration::from_millis(deadline_ms))).await;
            });
            protocol::render_ok("shutting-down")
        }
    }
}

fn render_error(e: SupervisorError) -> String {
    protocol::render_err(e.kind, &e.reason)
}

fn render_protocol_error(e: ProtocolError) -> String {
    protocol::render_err(ErrorKind::StateConflict, &e.to_string())
}

fn render_json<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => protocol::render_ok(&json),
        Err(e) => protocol::render_err(ErrorKind::Persistence, &e.to_string()),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
