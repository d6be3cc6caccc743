// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervision errors.

use devtool_core::{ErrorKind, JoinedErrors, ProcessId, StateConflict};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcError {
    #[error("process {id}: {source}")]
    InvalidState {
        id: ProcessId,
        #[source]
        source: StateConflict,
    },

    #[error("duplicate process ID: {0}")]
    DuplicateId(ProcessId),

    #[error("manager is shutting down")]
    ShuttingDown,

    #[error("process not found: {0}")]
    NotFound(ProcessId),

    #[error("process {id} is {state}, not terminal")]
    NotTerminal {
        id: ProcessId,
        state: devtool_core::ProcessState,
    },

    #[error("spawn failed for {id}: {source}")]
    Spawn {
        id: ProcessId,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Joined(#[from] JoinedErrors),
}

impl ProcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcError::InvalidState { .. }
            | ProcError::DuplicateId(_)
            | ProcError::NotTerminal { .. }
            | ProcError::ShuttingDown => ErrorKind::StateConflict,
            ProcError::NotFound(_) => ErrorKind::NotFound,
            ProcError::Spawn { .. } => ErrorKind::Spawn,
            ProcError::Cancelled => ErrorKind::Cancelled,
            ProcError::Joined(_) => ErrorKind::StateConflict,
        }
    }
}
