// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One reverse proxy server: accept loop, forwarding, instrumentation.
//!
//! Request pipeline: control endpoints are served directly; everything
//! else consults the chaos engine, forwards to the target with
//! hop-by-hop headers stripped, injects the bootstrap script into HTML,
//! applies body-level chaos, and appends an `http` event to the ring.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use devtool_chaos::{ChaosAction, ChaosConfig, ChaosEngine, ChaosRule};
use devtool_core::{
    Clock, EventRing, ProxyEvent, ProxyId, ProxyState, ProxyStateCell, Sequenced, SystemClock,
};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::http::uri::{Authority, Scheme};
use hyper::http::{HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::apply::{self, ProxyBody};
use crate::control::{self, ControlCommand};
use crate::error::ProxyError;
use crate::inject;
use crate::port::derive_port;
use crate::reorder::ReorderBuffer;

/// Default capacity of the per-proxy event ring.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 500;

/// Graceful window for in-flight connections during stop before they
/// are forcibly closed.
const CONN_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Headers never forwarded in either direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Configuration for one proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub name: String,
    pub project_path: PathBuf,
    pub target_url: String,
    /// 0 derives a stable port from the target and project.
    pub port: u16,
    pub max_log_entries: usize,
    pub chaos_rules: Vec<ChaosRule>,
    pub chaos_seed: Option<u64>,
}

impl ProxyConfig {
    pub fn new(
        name: impl Into<String>,
        project_path: impl Into<PathBuf>,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project_path: project_path.into(),
            target_url: target_url.into(),
            port: 0,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
            chaos_rules: Vec::new(),
            chaos_seed: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_chaos(mut self, rules: Vec<ChaosRule>, seed: Option<u64>) -> Self {
        self.chaos_rules = rules;
        self.chaos_seed = seed;
        self
    }

    pub fn with_max_log_entries(mut self, max: usize) -> Self {
        self.max_log_entries = max;
        self
    }
}

/// Snapshot of a proxy for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyInfo {
    pub id: String,
    pub name: String,
    pub state: ProxyState,
    pub target_url: String,
    pub listen_addr: String,
    pub project_path: PathBuf,
    pub public_url: Option<String>,
    pub inject_version: String,
    pub events_logged: usize,
    pub chaos: devtool_chaos::StatsSnapshot,
}

#[derive(Debug)]
pub struct ProxyServer {
    id: ProxyId,
    config: ProxyConfig,
    target_scheme: Scheme,
    target_authority: Authority,
    listen_addr: SocketAddr,
    state: ProxyStateCell,
    events: EventRing<ProxyEvent>,
    chaos: ChaosEngine,
    reorder: Arc<ReorderBuffer>,
    client: Client<HttpConnector, Incoming>,
    /// Breaks the accept loop.
    accept_cancel: CancellationToken,
    /// Forcibly closes in-flight connections (and SSE streams).
    conn_cancel: CancellationToken,
    conns: TaskTracker,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    commands: broadcast::Sender<ControlCommand>,
    public_url: Mutex<Option<String>>,
}

impl ProxyServer {
    /// Bind the listener and spawn the accept loop.
    ///
    /// An occupied port is an error, never a retry: derived ports exist
    /// so restarts land on the same address.
    pub async fn start(config: ProxyConfig) -> Result<Arc<Self>, ProxyError> {
        let uri: Uri = config.target_url.parse().map_err(|e| ProxyError::InvalidTarget {
            url: config.target_url.clone(),
            reason: format!("{}", e),
        })?;
        let scheme = uri.scheme().cloned().unwrap_or(Scheme::HTTP);
        if scheme != Scheme::HTTP {
            return Err(ProxyError::InvalidTarget {
                url: config.target_url.clone(),
                reason: "only http targets are proxied".to_string(),
            });
        }
        let authority = uri.authority().cloned().ok_or_else(|| ProxyError::InvalidTarget {
            url: config.target_url.clone(),
            reason: "missing host".to_string(),
        })?;

        let port = if config.port == 0 {
            derive_port(&config.target_url, &config.project_path)
        } else {
            config.port
        };
        let listener = match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                return Err(ProxyError::AddrInUse { port });
            }
            Err(e) => return Err(e.into()),
        };
        let listen_addr = listener.local_addr()?;

        let id = ProxyId::derive(&config.project_path, &config.name, "localhost", port);
        let chaos = ChaosEngine::new(ChaosConfig {
            rules: config.chaos_rules.clone(),
            seed: config.chaos_seed,
        })?;
        // Distinct stream from the rule draws so reordering does not
        // perturb rule reproducibility.
        let reorder = Arc::new(ReorderBuffer::new(config.chaos_seed.map(|s| s.wrapping_add(1))));
        let (commands, _) = broadcast::channel(32);

        let server = Arc::new(Self {
            id,
            events: EventRing::new(config.max_log_entries),
            config,
            target_scheme: scheme,
            target_authority: authority,
            listen_addr,
            state: ProxyStateCell::new(ProxyState::Starting),
            chaos,
            reorder,
            client: Client::builder(TokioExecutor::new()).build_http(),
            accept_cancel: CancellationToken::new(),
            conn_cancel: CancellationToken::new(),
            conns: TaskTracker::new(),
            accept_task: Mutex::new(None),
            commands,
            public_url: Mutex::new(None),
        });

        server.state.transition(ProxyState::Starting, ProxyState::Running)?;

        let accept = Arc::clone(&server);
        let handle = tokio::spawn(async move { accept.accept_loop(listener).await });
        *server.accept_task.lock() = Some(handle);

        info!(id = %server.id, addr = %server.listen_addr, target = %server.config.target_url, "proxy started");
        Ok(server)
    }

    pub fn id(&self) -> &ProxyId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn project_path(&self) -> &std::path::Path {
        &self.config.project_path
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn state(&self) -> ProxyState {
        self.state.load()
    }

    pub fn chaos(&self) -> &ChaosEngine {
        &self.chaos
    }

    /// Snapshot of the event ring, oldest first.
    pub fn events(&self) -> (Vec<Sequenced<ProxyEvent>>, bool) {
        self.events.snapshot()
    }

    pub fn set_public_url(&self, url: Option<String>) {
        *self.public_url.lock() = url;
    }

    pub fn public_url(&self) -> Option<String> {
        self.public_url.lock().clone()
    }

    /// Relay a script to the attached tab. Returns the receiver count.
    pub fn exec(&self, script: String) -> usize {
        self.commands.send(ControlCommand::Exec { script }).unwrap_or(0)
    }

    /// Relay a toast to the attached tab. Returns the receiver count.
    pub fn toast(&self, message: String) -> usize {
        self.commands.send(ControlCommand::Toast { message }).unwrap_or(0)
    }

    pub fn info(&self) -> ProxyInfo {
        ProxyInfo {
            id: self.id.to_string(),
            name: self.config.name.clone(),
            state: self.state.load(),
            target_url: self.config.target_url.clone(),
            listen_addr: self.listen_addr.to_string(),
            project_path: self.config.project_path.clone(),
            public_url: self.public_url(),
            inject_version: inject::INJECT_VERSION.to_string(),
            events_logged: self.events.len(),
            chaos: self.chaos.stats(),
        }
    }

    /// Stop accepting, drain in-flight connections within the deadline,
    /// then close stragglers forcibly.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), ProxyError> {
        if let Err(conflict) = self.state.transition(ProxyState::Running, ProxyState::Stopping) {
            let actual = self.state.load();
            if actual == ProxyState::Stopping || actual == ProxyState::Stopped {
                return Ok(());
            }
            return Err(conflict.into());
        }

        self.accept_cancel.cancel();
        let accept_task = self.accept_task.lock().take();
        if let Some(handle) = accept_task {
            let _ = handle.await;
        }

        self.conns.close();
        let wait = self.conns.wait();
        tokio::pin!(wait);
        let mut drained = false;
        tokio::select! {
            biased;
            _ = &mut wait => { drained = true; }
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(CONN_DRAIN_TIMEOUT) => {}
        }

        // Remaining connections (SSE streams, chaos holds) die now.
        self.conn_cancel.cancel();
        if !drained {
            let _ = tokio::time::timeout(Duration::from_millis(100), &mut wait).await;
        }

        self.state.force(ProxyState::Stopped);
        info!(id = %self.id, "proxy stopped");
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.accept_cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _peer)) => {
                        let server = Arc::clone(&self);
                        self.conns.spawn(async move { server.serve_conn(stream).await });
                    }
                    Err(e) => {
                        warn!(id = %self.id, error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }
    }

    async fn serve_conn(self: Arc<Self>, stream: TcpStream) {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |req| {
            let server = Arc::clone(&server);
            async move { server.handle(req).await }
        });
        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::select! {
            result = conn => {
                if let Err(e) = result {
                    debug!(id = %self.id, error = %e, "connection closed");
                }
            }
            _ = self.conn_cancel.cancelled() => {}
        }
    }

    async fn handle(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<Response<ProxyBody>, std::io::Error> {
        if req.uri().path().starts_with("/__devtool/") {
            return Ok(control::handle(req, &self.events, &self.commands, &self.conn_cancel)
                .await);
        }
        self.forward(req).await
    }

    async fn forward(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<ProxyBody>, std::io::Error> {
        let started = Instant::now();
        let method = req.method().as_str().to_string();
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let actions = self.chaos.evaluate(&method, &url);
        let chaos_names: Vec<String> = actions.iter().map(|a| a.name().to_string()).collect();

        if actions.iter().any(|a| matches!(a, ChaosAction::PacketLoss)) {
            self.log_http(&method, &url, None, started, None, &chaos_names);
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "chaos: packet loss",
            ));
        }

        if actions.iter().any(|a| matches!(a, ChaosAction::Timeout)) {
            self.log_http(&method, &url, None, started, None, &chaos_names);
            // Held open until the client disconnects (which drops this
            // future) or shutdown force-closes the connection.
            let never: std::convert::Infallible = futures_util::future::pending().await;
            match never {}
        }

        for action in &actions {
            if let ChaosAction::Latency { delay } | ChaosAction::Stale { delay } = action {
                tokio::time::sleep(*delay).await;
            }
        }

        if let Some(ChaosAction::HttpError { status, message }) =
            actions.iter().find(|a| matches!(a, ChaosAction::HttpError { .. }))
        {
            let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            self.log_http(&method, &url, Some(code.as_u16()), started, None, &chaos_names);
            let resp = control::status_response(code, message);
            self.maybe_reorder(&actions).await;
            return Ok(resp);
        }

        // Forward upstream, fully buffering the response body so the
        // injection and body-chaos steps can work on it.
        let upstream = self.send_upstream(req).await;
        let (status, headers, body) = match upstream {
            Ok(parts) => parts,
            Err(reason) => {
                warn!(id = %self.id, %url, error = %reason, "upstream request failed");
                self.log_http(&method, &url, Some(502), started, Some(reason), &chaos_names);
                self.maybe_reorder(&actions).await;
                return Ok(control::status_response(
                    StatusCode::BAD_GATEWAY,
                    "upstream unreachable",
                ));
            }
        };

        let response = self.build_response(status, headers, body, &actions);
        self.log_http(&method, &url, Some(status.as_u16()), started, None, &chaos_names);
        self.maybe_reorder(&actions).await;
        Ok(response)
    }

    async fn send_upstream(
        &self,
        req: Request<Incoming>,
    ) -> Result<(StatusCode, HeaderMap, Bytes), String> {
        let req = self.rewrite_request(req)?;
        let response = self.client.request(req).await.map_err(|e| e.to_string())?;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.map_err(|e| e.to_string())?.to_bytes();
        Ok((parts.status, parts.headers, bytes))
    }

    fn rewrite_request(&self, req: Request<Incoming>) -> Result<Request<Incoming>, String> {
        let (mut parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        parts.uri = Uri::builder()
            .scheme(self.target_scheme.clone())
            .authority(self.target_authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| e.to_string())?;

        for name in HOP_BY_HOP {
            parts.headers.remove(name);
        }
        // The client sets Host from the rewritten URI.
        parts.headers.remove("host");
        // Identity bodies only: injection cannot work on compressed HTML.
        parts.headers.remove("accept-encoding");

        Ok(Request::from_parts(parts, body))
    }

    fn build_response(
        &self,
        status: StatusCode,
        upstream_headers: HeaderMap,
        body: Bytes,
        actions: &[ChaosAction],
    ) -> Response<ProxyBody> {
        let content_type = upstream_headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let encoded = upstream_headers.contains_key("content-encoding");

        let mut body = body;
        if !encoded && inject::is_html(content_type.as_deref()) {
            body = inject::inject_html(&body);
        }

        for action in actions {
            match action {
                ChaosAction::Truncate { keep_percent } => {
                    body = apply::truncate(&body, *keep_percent);
                }
                ChaosAction::BitFlip { flips } => {
                    body = apply::bit_flip(&body, *flips, |n| self.chaos.draw_index(n));
                }
                ChaosAction::CorruptJson => {
                    body = apply::corrupt_json(&body, |n| self.chaos.draw_index(n));
                }
                _ => {}
            }
        }

        let mut builder = Response::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in upstream_headers.iter() {
                if HOP_BY_HOP.contains(&name.as_str()) || name.as_str() == "content-length" {
                    continue;
                }
                headers.insert(name.clone(), value.clone());
            }
            // Recomputed after injection and body chaos.
            if let Ok(len) = HeaderValue::from_str(&body.len().to_string()) {
                headers.insert("content-length", len);
            }
        }

        let drip = actions.iter().find_map(|a| match a {
            ChaosAction::SlowDrip { chunk_size, delay_per_chunk } => {
                Some((*chunk_size, *delay_per_chunk))
            }
            _ => None,
        });
        let disconnect = actions.iter().find_map(|a| match a {
            ChaosAction::Disconnect { after_bytes, after_percent } => {
                Some((*after_bytes, *after_percent))
            }
            _ => None,
        });

        let final_body = if let Some((after_bytes, after_percent)) = disconnect {
            apply::disconnect_body(body, after_bytes, after_percent)
        } else if let Some((chunk_size, delay)) = drip {
            apply::drip_body(body, chunk_size, delay)
        } else {
            apply::full_body(body)
        };

        match builder.body(final_body) {
            Ok(resp) => resp,
            Err(_) => control::status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "response build failed",
            ),
        }
    }

    async fn maybe_reorder(&self, actions: &[ChaosAction]) {
        if let Some(ChaosAction::OutOfOrder { min_requests, max_wait }) =
            actions.iter().find(|a| matches!(a, ChaosAction::OutOfOrder { .. }))
        {
            self.reorder.hold(*min_requests, *max_wait).await;
        }
    }

    fn log_http(
        &self,
        method: &str,
        url: &str,
        status: Option<u16>,
        started: Instant,
        error: Option<String>,
        chaos: &[String],
    ) {
        self.events.push(
            SystemClock.epoch_ms(),
            ProxyEvent::Http {
                method: method.to_string(),
                url: url.to_string(),
                status,
                duration_ms: Some(started.elapsed().as_millis() as u64),
                error,
                chaos: chaos.to_vec(),
            },
        );
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
