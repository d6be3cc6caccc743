// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic listen-port derivation.
//!
//! When the caller passes port 0, the port is derived from a stable
//! hash of the target URL and project path so a restarted proxy lands
//! on the same address and bookmarked browser tabs keep working. An
//! occupied derived port is an error, not a retry: silently moving
//! would defeat the stability guarantee.

use std::path::Path;

use sha2::{Digest, Sha256};

/// First port of the derivation range.
pub const PORT_RANGE_START: u16 = 20000;

/// Number of ports in the derivation range.
pub const PORT_RANGE_LEN: u16 = 20000;

/// Stable port for `(target_url, project_path)` in
/// `[PORT_RANGE_START, PORT_RANGE_START + PORT_RANGE_LEN)`.
pub fn derive_port(target_url: &str, project_path: &Path) -> u16 {
    let mut hasher = Sha256::new();
    hasher.update(target_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(project_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let mut value = [0u8; 8];
    value.copy_from_slice(&digest[..8]);
    let h = u64::from_be_bytes(value);
    PORT_RANGE_START + (h % PORT_RANGE_LEN as u64) as u16
}

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
