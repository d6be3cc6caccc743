// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end specs.
//!
//! These exercise the crates together the way the daemon wires them:
//! real children, real sockets, real signals.

mod specs {
    mod chaos_replay;
    mod lifecycle;
    mod lookup;
    mod ring;
}
