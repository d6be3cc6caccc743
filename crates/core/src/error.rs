// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the daemon.
//!
//! Leaf crates return their own typed errors; each maps into one of
//! these kinds so the RPC surface can report `(kind, reason)` pairs
//! uniformly. Managers collect fan-out failures into [`JoinedErrors`]
//! so one stuck child never masks its peers.

use thiserror::Error;

/// Coarse classification of every user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation incompatible with current state (duplicate ID,
    /// stop-before-start, shutting-down).
    StateConflict,
    /// The OS failed to start a child process.
    Spawn,
    /// Exact or fuzzy resolution found nothing.
    NotFound,
    /// Fuzzy resolution matched more than one candidate.
    Ambiguous,
    /// Proxy upstream I/O failed.
    Transport,
    /// Context deadline or explicit cancel.
    Cancelled,
    /// PID file or similar persistence I/O failed (non-fatal).
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StateConflict => "state-conflict",
            ErrorKind::Spawn => "spawn",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Joined errors from a parallel fan-out (stop-all, shutdown).
///
/// Each entry is `(subject, reason)`. Construction via [`JoinedErrors::from_results`]
/// keeps call sites to one line: collect the per-item outcomes, join, done.
#[derive(Debug, Error)]
#[error("{}", self.render())]
pub struct JoinedErrors {
    entries: Vec<(String, String)>,
}

impl JoinedErrors {
    /// Build from per-subject outcomes, returning `Ok(())` when none failed.
    pub fn from_results(entries: Vec<(String, String)>) -> Result<(), JoinedErrors> {
        if entries.is_empty() {
            Ok(())
        } else {
            Err(JoinedErrors { entries })
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn render(&self) -> String {
        let parts: Vec<String> =
            self.entries.iter().map(|(who, why)| format!("{}: {}", who, why)).collect();
        format!("{} failure(s): {}", self.entries.len(), parts.join("; "))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
