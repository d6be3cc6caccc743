// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text command framing on the RPC socket.
//!
//! Frames are newline-terminated lines ending with `;;`. Commands are
//! whitespace-tokenized; the last token of `PROC START` onwards is the
//! child argv. Responses are single `OK …;;` / `ERR <kind> <reason>;;`
//! lines.

use std::path::PathBuf;

use devtool_core::ErrorKind;
use thiserror::Error;

/// Frame terminator on both requests and responses.
pub const FRAME_TERMINATOR: &str = ";;";

/// A parsed command from the RPC layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Advertise the session's project path; scopes later commands.
    Hello { project_path: PathBuf },
    Ping,
    ProxyStart { id: String, target_url: String, port: u16 },
    ProxyStop { id: String },
    ProxyList,
    ProcStart { id: String, cwd: PathBuf, command: Vec<String> },
    ProcStop { id: String },
    ProcList,
    Shutdown { deadline_ms: u64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("frame missing `;;` terminator")]
    Unterminated,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument: {0}")]
    MissingArg(&'static str),

    #[error("invalid {what}: {value}")]
    BadArg { what: &'static str, value: String },
}

/// Parse one frame (without the trailing newline).
pub fn parse_line(line: &str) -> Result<Request, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let Some(body) = line.strip_suffix(FRAME_TERMINATOR) else {
        return Err(ProtocolError::Unterminated);
    };
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let mut tokens = tokens.into_iter();

    let command = tokens.next().ok_or(ProtocolError::Empty)?;
    match command.to_ascii_uppercase().as_str() {
        "HELLO" => {
            let path = tokens.next().ok_or(ProtocolError::MissingArg("project_path"))?;
            Ok(Request::Hello { project_path: PathBuf::from(path) })
        }
        "PING" => Ok(Request::Ping),
        "PROXY" => parse_proxy(&mut tokens),
        "PROC" => parse_proc(&mut tokens),
        "SHUTDOWN" => {
            let deadline = tokens.next().ok_or(ProtocolError::MissingArg("deadline_ms"))?;
            let deadline_ms = deadline.parse::<u64>().map_err(|_| ProtocolError::BadArg {
                what: "deadline_ms",
                value: deadline.to_string(),
            })?;
            Ok(Request::Shutdown { deadline_ms })
        }
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

fn parse_proxy<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<Request, ProtocolError> {
    let verb = tokens.next().ok_or(ProtocolError::MissingArg("verb"))?;
    match verb.to_ascii_uppercase().as_str() {
        "START" => {
            let id = tokens.next().ok_or(ProtocolError::MissingArg("id"))?;
            let target = tokens.next().ok_or(ProtocolError::MissingArg("target_url"))?;
            let port = tokens.next().ok_or(ProtocolError::MissingArg("port"))?;
            let port = port.parse::<u16>().map_err(|_| ProtocolError::BadArg {
                what: "port",
                value: port.to_string(),
            })?;
            Ok(Request::ProxyStart {
                id: id.to_string(),
                target_url: target.to_string(),
                port,
            })
        }
        "STOP" => {
            let id = tokens.next().ok_or(ProtocolError::MissingArg("id"))?;
            Ok(Request::ProxyStop { id: id.to_string() })
        }
        "LIST" => Ok(Request::ProxyList),
        other => Err(ProtocolError::UnknownCommand(format!("PROXY {}", other))),
    }
}

fn parse_proc<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Request, ProtocolError> {
    let verb = tokens.next().ok_or(ProtocolError::MissingArg("verb"))?;
    match verb.to_ascii_uppercase().as_str() {
        "START" => {
            let id = tokens.next().ok_or(ProtocolError::MissingArg("id"))?;
            let cwd = tokens.next().ok_or(ProtocolError::MissingArg("cwd"))?;
            let command: Vec<String> = tokens.map(|t| t.to_string()).collect();
            if command.is_empty() {
                return Err(ProtocolError::MissingArg("cmd"));
            }
            Ok(Request::ProcStart {
                id: id.to_string(),
                cwd: PathBuf::from(cwd),
                command,
            })
        }
        "STOP" => {
            let id = tokens.next().ok_or(ProtocolError::MissingArg("id"))?;
            Ok(Request::ProcStop { id: id.to_string() })
        }
        "LIST" => Ok(Request::ProcList),
        other => Err(ProtocolError::UnknownCommand(format!("PROC {}", other))),
    }
}

/// Render a success response frame.
pub fn render_ok(detail: &str) -> String {
    if detail.is_empty() {
        format!("OK{}\n", FRAME_TERMINATOR)
    } else {
        format!("OK {}{}\n", sanitize(detail), FRAME_TERMINATOR)
    }
}

/// Render a failure response frame: `ERR <kind> <reason>;;`.
pub fn render_err(kind: ErrorKind, reason: &str) -> String {
    format!("ERR {} {}{}\n", kind, sanitize(reason), FRAME_TERMINATOR)
}

/// Responses are single lines; embedded newlines would desync framing.
fn sanitize(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
