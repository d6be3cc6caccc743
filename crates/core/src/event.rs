// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured proxy log events.
//!
//! Every request handled by a proxy and every browser-originated record
//! posted to its control endpoint is appended to the proxy's event ring
//! as one of these variants. The serialized form uses a lowercase `type`
//! tag so the RPC layer can filter by kind without knowing the payloads.

use serde::{Deserialize, Serialize};

use crate::ring::Sequenced;

/// One structured proxy event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProxyEvent {
    /// A forwarded (or short-circuited) HTTP exchange.
    Http {
        method: String,
        url: String,
        /// Response status; absent when the connection was dropped
        /// before a response existed (packet loss, timeout holds).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        /// Transport error tag for upstream I/O failures.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Names of chaos actions applied to this exchange.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        chaos: Vec<String>,
    },
    /// Browser console output captured by the injected script.
    Console { level: String, message: String },
    /// Uncaught JS error.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Performance measurement reported by the page.
    Performance { metric: String, value: f64 },
    /// Free-form event from the page or the RPC layer.
    Custom { name: String, data: serde_json::Value },
}

impl ProxyEvent {
    /// The lowercase type tag, matching the serialized form.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ProxyEvent::Http { .. } => "http",
            ProxyEvent::Console { .. } => "console",
            ProxyEvent::Error { .. } => "error",
            ProxyEvent::Performance { .. } => "performance",
            ProxyEvent::Custom { .. } => "custom",
        }
    }
}

/// A proxy event as stored in the ring: payload + seq + wall clock.
pub type EventRecord = Sequenced<ProxyEvent>;

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
