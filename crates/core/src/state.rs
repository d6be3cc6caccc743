// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process and proxy lifecycle states with compare-and-swap cells.
//!
//! State transitions happen on an [`AtomicU8`] so concurrent callers race
//! on the CAS instead of a lock; the loser gets a [`StateConflict`] naming
//! the state it actually observed.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transition refused: the cell did not hold the expected source state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid state transition {from} -> {to}: state is {actual}")]
pub struct StateConflict {
    pub from: &'static str,
    pub to: &'static str,
    pub actual: &'static str,
}

// ---------------------------------------------------------------------------
// Managed-process state
// ---------------------------------------------------------------------------

/// Lifecycle state of a managed process.
///
/// Transitions are monotonic along
/// `Pending → Starting → Running → (Stopping →)? (Stopped | Failed)`;
/// `Zombie` is entered only from `Running` by the health check, and
/// `Starting → Failed` covers spawn failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ProcessState {
    Pending = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    Failed = 5,
    Zombie = 6,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Pending => "pending",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Stopped => "stopped",
            ProcessState::Failed => "failed",
            ProcessState::Zombie => "zombie",
        }
    }

    /// Terminal states: no further transitions are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed | ProcessState::Zombie)
    }

    fn from_u8(v: u8) -> ProcessState {
        match v {
            0 => ProcessState::Pending,
            1 => ProcessState::Starting,
            2 => ProcessState::Running,
            3 => ProcessState::Stopping,
            4 => ProcessState::Stopped,
            5 => ProcessState::Failed,
            _ => ProcessState::Zombie,
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Atomic cell holding a [`ProcessState`].
#[derive(Debug)]
pub struct ProcessStateCell(AtomicU8);

impl ProcessStateCell {
    pub fn new(state: ProcessState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// CAS `from → to`; on conflict returns the state actually held.
    pub fn transition(
        &self,
        from: ProcessState,
        to: ProcessState,
    ) -> Result<(), StateConflict> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| StateConflict {
                from: from.as_str(),
                to: to.as_str(),
                actual: ProcessState::from_u8(actual).as_str(),
            })
    }

    /// Unconditional store. Reserved for the owner's internal paths
    /// (e.g. reverting `Starting → Failed` after a spawn error).
    pub fn force(&self, state: ProcessState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for ProcessStateCell {
    fn default() -> Self {
        Self::new(ProcessState::Pending)
    }
}

// ---------------------------------------------------------------------------
// Proxy state
// ---------------------------------------------------------------------------

/// Lifecycle state of a reverse proxy server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ProxyState {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ProxyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyState::Starting => "starting",
            ProxyState::Running => "running",
            ProxyState::Stopping => "stopping",
            ProxyState::Stopped => "stopped",
        }
    }

    fn from_u8(v: u8) -> ProxyState {
        match v {
            0 => ProxyState::Starting,
            1 => ProxyState::Running,
            2 => ProxyState::Stopping,
            _ => ProxyState::Stopped,
        }
    }
}

impl std::fmt::Display for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Atomic cell holding a [`ProxyState`].
#[derive(Debug)]
pub struct ProxyStateCell(AtomicU8);

impl ProxyStateCell {
    pub fn new(state: ProxyState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ProxyState {
        ProxyState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn transition(&self, from: ProxyState, to: ProxyState) -> Result<(), StateConflict> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| StateConflict {
                from: from.as_str(),
                to: to.as_str(),
                actual: ProxyState::from_u8(actual).as_str(),
            })
    }

    pub fn force(&self, state: ProxyState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for ProxyStateCell {
    fn default() -> Self {
        Self::new(ProxyState::Starting)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
