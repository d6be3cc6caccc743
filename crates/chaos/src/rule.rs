// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chaos rule model.
//!
//! Rules arrive as JSON from the RPC layer (or from a named preset) and
//! are compiled by the engine. The `kind` tag selects the effect; the
//! remaining fields are kind-specific parameters.

use serde::{Deserialize, Serialize};

/// A matcher + probability + effect record consulted per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosRule {
    pub id: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Regex applied to the request URL (path + query).
    #[serde(default = "default_url_pattern")]
    pub url_pattern: String,

    /// Method allow-list; empty means all methods.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Probability in [0, 1] that a matching request is affected.
    pub probability: f64,

    #[serde(flatten)]
    pub kind: ChaosKind,
}

fn default_enabled() -> bool {
    true
}

fn default_url_pattern() -> String {
    ".*".to_string()
}

impl ChaosRule {
    /// Rule with defaults: enabled, all URLs, all methods.
    pub fn new(id: impl Into<String>, probability: f64, kind: ChaosKind) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            url_pattern: default_url_pattern(),
            methods: Vec::new(),
            probability,
            kind,
        }
    }

    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = pattern.into();
        self
    }

    pub fn with_methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }
}

/// The effect a rule injects, with its kind-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChaosKind {
    /// Sleep uniform in `[min_ms, max_ms] ± jitter_ms` before forwarding.
    Latency {
        min_ms: u64,
        max_ms: u64,
        #[serde(default)]
        jitter_ms: u64,
    },
    /// Write the response in `chunk_size`-byte chunks at `bytes_per_ms`.
    SlowDrip { chunk_size: usize, bytes_per_ms: u64 },
    /// Abort the connection partway through the body.
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drop_after_bytes: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drop_after_percent: Option<f64>,
    },
    /// Do not forward; close the client connection.
    PacketLoss,
    /// Hold the connection open and never respond.
    Timeout,
    /// Buffer responses and flush them in a random permutation.
    OutOfOrder { reorder_min_requests: usize, reorder_max_wait_ms: u64 },
    /// Delay the response on an hours scale.
    Stale { stale_delay_ms: u64 },
    /// Short-circuit with one of `error_codes`.
    HttpError {
        error_codes: Vec<u16>,
        #[serde(default)]
        error_message: String,
    },
    /// Forward only the leading `truncate_percent` of the body.
    Truncate { truncate_percent: f64 },
    /// Flip bits in the body before forwarding.
    BitFlip {
        #[serde(default = "default_flips")]
        flips: usize,
    },
    /// Structurally mutate a JSON body before forwarding.
    CorruptJson,
}

fn default_flips() -> usize {
    8
}

impl ChaosKind {
    /// Stable kind name; one action of each kind applies per request.
    pub fn name(&self) -> &'static str {
        match self {
            ChaosKind::Latency { .. } => "latency",
            ChaosKind::SlowDrip { .. } => "slow_drip",
            ChaosKind::Disconnect { .. } => "disconnect",
            ChaosKind::PacketLoss => "packet_loss",
            ChaosKind::Timeout => "timeout",
            ChaosKind::OutOfOrder { .. } => "out_of_order",
            ChaosKind::Stale { .. } => "stale",
            ChaosKind::HttpError { .. } => "http_error",
            ChaosKind::Truncate { .. } => "truncate",
            ChaosKind::BitFlip { .. } => "bit_flip",
            ChaosKind::CorruptJson => "corrupt_json",
        }
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
