// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control endpoints served on the proxy's own port.
//!
//! Everything under `/__devtool/` is handled here and never forwarded
//! to the target. The browser posts captured events, fetches the
//! instrumentation bundle, and holds an SSE stream open for commands
//! the RPC layer relays (exec snippets, toasts).

use bytes::Bytes;
use devtool_core::{Clock, EventRing, ProxyEvent, SystemClock};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::apply::{full_body, ProxyBody};
use crate::inject;

/// A command relayed from the RPC layer to the attached browser tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ControlCommand {
    Exec { script: String },
    Toast { message: String },
}

impl ControlCommand {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            ControlCommand::Exec { .. } => "exec",
            ControlCommand::Toast { .. } => "toast",
        }
    }
}

/// One SSE frame for a command.
pub fn sse_frame(cmd: &ControlCommand) -> String {
    let data = serde_json::to_string(cmd).unwrap_or_else(|_| "{}".to_string());
    format!("event: {}\ndata: {}\n\n", cmd.event_name(), data)
}

#[derive(Deserialize)]
struct ExecRequest {
    script: String,
}

#[derive(Deserialize)]
struct ToastRequest {
    message: String,
}

/// Dispatch a `/__devtool/…` request.
pub async fn handle(
    req: Request<Incoming>,
    events: &EventRing<ProxyEvent>,
    commands: &broadcast::Sender<ControlCommand>,
    cancel: &CancellationToken,
) -> Response<ProxyBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::GET && path == inject::INJECT_PATH {
        serve_bundle()
    } else if method == Method::POST && path == "/__devtool/events" {
        post_event(req, events).await
    } else if method == Method::POST && path == "/__devtool/exec" {
        relay(req, commands, |body: ExecRequest| ControlCommand::Exec { script: body.script })
            .await
    } else if method == Method::POST && path == "/__devtool/toast" {
        relay(req, commands, |body: ToastRequest| ControlCommand::Toast {
            message: body.message,
        })
        .await
    } else if method == Method::GET && path == "/__devtool/stream" {
        serve_stream(commands, cancel)
    } else {
        status_response(StatusCode::NOT_FOUND, "unknown control endpoint")
    }
}

fn serve_bundle() -> Response<ProxyBody> {
    match Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/javascript; charset=utf-8")
        .header("cache-control", "no-store")
        .body(full_body(Bytes::from(inject::bundle())))
    {
        Ok(resp) => resp,
        Err(_) => fallback_error(),
    }
}

async fn post_event(
    req: Request<Incoming>,
    events: &EventRing<ProxyEvent>,
) -> Response<ProxyBody> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return status_response(StatusCode::BAD_REQUEST, "unreadable body"),
    };
    match serde_json::from_slice::<ProxyEvent>(&body) {
        Ok(event) => {
            let seq = events.push(SystemClock.epoch_ms(), event);
            debug!(seq, "browser event recorded");
            status_response(StatusCode::NO_CONTENT, "")
        }
        Err(e) => status_response(StatusCode::BAD_REQUEST, &format!("invalid event: {}", e)),
    }
}

async fn relay<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
    commands: &broadcast::Sender<ControlCommand>,
    build: impl FnOnce(T) -> ControlCommand,
) -> Response<ProxyBody> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return status_response(StatusCode::BAD_REQUEST, "unreadable body"),
    };
    let parsed: T = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => return status_response(StatusCode::BAD_REQUEST, &format!("invalid command: {}", e)),
    };
    // Err means no browser tab is currently attached; not a failure.
    let subscribers = commands.send(build(parsed)).unwrap_or(0);
    let payload = format!("{{\"delivered\":{}}}", subscribers);
    json_response(StatusCode::ACCEPTED, payload)
}

fn serve_stream(
    commands: &broadcast::Sender<ControlCommand>,
    cancel: &CancellationToken,
) -> Response<ProxyBody> {
    let mut rx = commands.subscribe();
    let cancel = cancel.clone();
    let (tx, body_rx) = mpsc::channel::<Result<Frame<Bytes>, std::io::Error>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(Frame::data(Bytes::from(": connected\n\n")))).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Ok(cmd) => {
                        let frame = Frame::data(Bytes::from(sse_frame(&cmd)));
                        if tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    match Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .body(StreamBody::new(ReceiverStream::new(body_rx)).boxed())
    {
        Ok(resp) => resp,
        Err(_) => fallback_error(),
    }
}

pub(crate) fn status_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let body = if message.is_empty() {
        crate::apply::empty_body()
    } else {
        full_body(Bytes::from(message.to_string()))
    };
    match Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(body)
    {
        Ok(resp) => resp,
        Err(_) => fallback_error(),
    }
}

pub(crate) fn json_response(status: StatusCode, payload: String) -> Response<ProxyBody> {
    match Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(full_body(Bytes::from(payload)))
    {
        Ok(resp) => resp,
        Err(_) => fallback_error(),
    }
}

fn fallback_error() -> Response<ProxyBody> {
    let mut resp = Response::new(crate::apply::empty_body());
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
