// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy errors.

use devtool_core::{ErrorKind, JoinedErrors, ProxyId, StateConflict};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid target URL {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("port {port} already in use")]
    AddrInUse { port: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("proxy not found: {0}")]
    NotFound(String),

    #[error("ambiguous proxy id {query}: matches {matches:?}")]
    Ambiguous { query: String, matches: Vec<String> },

    #[error("duplicate proxy ID: {0}")]
    Duplicate(ProxyId),

    #[error("manager is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    State(#[from] StateConflict),

    #[error("chaos config: {0}")]
    Chaos(#[from] devtool_chaos::ChaosError),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Joined(#[from] JoinedErrors),
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::InvalidTarget { .. }
            | ProxyError::AddrInUse { .. }
            | ProxyError::Duplicate(_)
            | ProxyError::ShuttingDown
            | ProxyError::Chaos(_)
            | ProxyError::Joined(_)
            | ProxyError::State(_) => ErrorKind::StateConflict,
            ProxyError::Io(_) => ErrorKind::Transport,
            ProxyError::NotFound(_) => ErrorKind::NotFound,
            ProxyError::Ambiguous { .. } => ErrorKind::Ambiguous,
            ProxyError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
