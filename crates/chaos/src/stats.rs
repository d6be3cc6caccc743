// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injection counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::engine::ChaosAction;

/// Monotonic counters updated on every evaluation.
#[derive(Debug, Default)]
pub struct ChaosStats {
    total_requests: AtomicU64,
    affected_requests: AtomicU64,
    latency_ms_injected: AtomicU64,
    errors_injected: AtomicU64,
    drops_injected: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub affected_requests: u64,
    pub latency_ms_injected: u64,
    pub errors_injected: u64,
    pub drops_injected: u64,
}

impl ChaosStats {
    pub fn record(&self, actions: &[ChaosAction]) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if actions.is_empty() {
            return;
        }
        self.affected_requests.fetch_add(1, Ordering::Relaxed);
        for action in actions {
            match action {
                ChaosAction::Latency { delay } | ChaosAction::Stale { delay } => {
                    self.latency_ms_injected
                        .fetch_add(delay.as_millis() as u64, Ordering::Relaxed);
                }
                ChaosAction::HttpError { .. } => {
                    self.errors_injected.fetch_add(1, Ordering::Relaxed);
                }
                ChaosAction::PacketLoss
                | ChaosAction::Disconnect { .. }
                | ChaosAction::Timeout => {
                    self.drops_injected.fetch_add(1, Ordering::Relaxed);
                }
                _ => {}
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            affected_requests: self.affected_requests.load(Ordering::Relaxed),
            latency_ms_injected: self.latency_ms_injected.load(Ordering::Relaxed),
            errors_injected: self.errors_injected.load(Ordering::Relaxed),
            drops_injected: self.drops_injected.load(Ordering::Relaxed),
        }
    }
}
