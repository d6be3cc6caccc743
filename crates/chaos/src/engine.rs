// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule evaluation with a seedable random source.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::rule::{ChaosKind, ChaosRule};
use crate::stats::{ChaosStats, StatsSnapshot};

/// Engine configuration: a rule set and an optional deterministic seed.
#[derive(Debug, Clone, Default)]
pub struct ChaosConfig {
    pub rules: Vec<ChaosRule>,
    /// Seed for the random source. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

/// Errors compiling a rule set.
#[derive(Debug, Error)]
pub enum ChaosError {
    #[error("invalid url_pattern in rule {id}: {source}")]
    Pattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// A resolved effect for one request. Parameters that involve a random
/// draw (latency duration, error code choice) are fixed at evaluation
/// time so the response pipeline applies them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ChaosAction {
    Latency { delay: Duration },
    SlowDrip { chunk_size: usize, delay_per_chunk: Duration },
    Disconnect { after_bytes: Option<u64>, after_percent: Option<f64> },
    PacketLoss,
    Timeout,
    OutOfOrder { min_requests: usize, max_wait: Duration },
    Stale { delay: Duration },
    HttpError { status: u16, message: String },
    Truncate { keep_percent: f64 },
    BitFlip { flips: usize },
    CorruptJson,
}

impl ChaosAction {
    pub fn name(&self) -> &'static str {
        match self {
            ChaosAction::Latency { .. } => "latency",
            ChaosAction::SlowDrip { .. } => "slow_drip",
            ChaosAction::Disconnect { .. } => "disconnect",
            ChaosAction::PacketLoss => "packet_loss",
            ChaosAction::Timeout => "timeout",
            ChaosAction::OutOfOrder { .. } => "out_of_order",
            ChaosAction::Stale { .. } => "stale",
            ChaosAction::HttpError { .. } => "http_error",
            ChaosAction::Truncate { .. } => "truncate",
            ChaosAction::BitFlip { .. } => "bit_flip",
            ChaosAction::CorruptJson => "corrupt_json",
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    rule: ChaosRule,
    url: Regex,
}

#[derive(Debug)]
struct EngineState {
    rules: Vec<CompiledRule>,
    rng: StdRng,
}

/// Per-proxy fault injector.
///
/// Evaluation and the random source share one short-lived lock so the
/// draw sequence is well-defined under concurrent requests; with a
/// fixed seed and a single-threaded trace the sequence is reproducible.
#[derive(Debug)]
pub struct ChaosEngine {
    state: Mutex<EngineState>,
    stats: ChaosStats,
}

impl ChaosEngine {
    pub fn new(config: ChaosConfig) -> Result<Self, ChaosError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            state: Mutex::new(EngineState { rules: compile(config.rules)?, rng }),
            stats: ChaosStats::default(),
        })
    }

    /// Engine with no rules: every request passes through untouched.
    pub fn disabled() -> Self {
        Self {
            state: Mutex::new(EngineState {
                rules: Vec::new(),
                rng: StdRng::from_entropy(),
            }),
            stats: ChaosStats::default(),
        }
    }

    /// Replace the rule set. The random source is untouched so an
    /// in-flight deterministic trace keeps its draw sequence.
    pub fn set_rules(&self, rules: Vec<ChaosRule>) -> Result<(), ChaosError> {
        let compiled = compile(rules)?;
        self.state.lock().rules = compiled;
        Ok(())
    }

    /// Enable or disable a rule by id. Returns false when unknown.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut state = self.state.lock();
        for c in &mut state.rules {
            if c.rule.id == id {
                c.rule.enabled = enabled;
                return true;
            }
        }
        false
    }

    pub fn rules(&self) -> Vec<ChaosRule> {
        self.state.lock().rules.iter().map(|c| c.rule.clone()).collect()
    }

    /// Evaluate a request. Rules are walked in array order; the first
    /// matching rule of each kind wins its category.
    pub fn evaluate(&self, method: &str, url: &str) -> Vec<ChaosAction> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let mut actions: Vec<ChaosAction> = Vec::new();

        for compiled in &state.rules {
            let rule = &compiled.rule;
            if !rule.enabled {
                continue;
            }
            if !method_allowed(&rule.methods, method) {
                continue;
            }
            if !compiled.url.is_match(url) {
                continue;
            }
            if actions.iter().any(|a| a.name() == rule.kind.name()) {
                continue;
            }
            let draw: f64 = state.rng.gen();
            if draw >= rule.probability {
                continue;
            }
            let action = resolve(&rule.kind, &mut state.rng);
            debug!(rule = %rule.id, action = action.name(), %url, "chaos action");
            actions.push(action);
        }

        self.stats.record(&actions);
        actions
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Uniform draw in `[0, n)` from the engine's random source. Body
    /// mutators use this so corruption reproduces under a fixed seed.
    pub fn draw_index(&self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.state.lock().rng.gen_range(0..n)
    }
}

fn compile(rules: Vec<ChaosRule>) -> Result<Vec<CompiledRule>, ChaosError> {
    rules
        .into_iter()
        .map(|rule| {
            let url = Regex::new(&rule.url_pattern)
                .map_err(|source| ChaosError::Pattern { id: rule.id.clone(), source })?;
            Ok(CompiledRule { rule, url })
        })
        .collect()
}

fn method_allowed(allow: &[String], method: &str) -> bool {
    allow.is_empty() || allow.iter().any(|m| m.eq_ignore_ascii_case(method))
}

/// Fix the kind's random parameters into a concrete action.
fn resolve(kind: &ChaosKind, rng: &mut StdRng) -> ChaosAction {
    match kind {
        ChaosKind::Latency { min_ms, max_ms, jitter_ms } => {
            let base = if max_ms > min_ms {
                rng.gen_range(*min_ms..=*max_ms)
            } else {
                *min_ms
            };
            let jitter = if *jitter_ms > 0 {
                rng.gen_range(0..=*jitter_ms * 2) as i64 - *jitter_ms as i64
            } else {
                0
            };
            let delay = base.saturating_add_signed(jitter);
            ChaosAction::Latency { delay: Duration::from_millis(delay) }
        }
        ChaosKind::SlowDrip { chunk_size, bytes_per_ms } => {
            let chunk_size = (*chunk_size).max(1);
            let rate = (*bytes_per_ms).max(1);
            // chunk_size bytes at bytes_per_ms gives the per-chunk delay.
            let delay_per_chunk = Duration::from_millis((chunk_size as u64).div_ceil(rate));
            ChaosAction::SlowDrip { chunk_size, delay_per_chunk }
        }
        ChaosKind::Disconnect { drop_after_bytes, drop_after_percent } => {
            ChaosAction::Disconnect {
                after_bytes: *drop_after_bytes,
                after_percent: *drop_after_percent,
            }
        }
        ChaosKind::PacketLoss => ChaosAction::PacketLoss,
        ChaosKind::Timeout => ChaosAction::Timeout,
        ChaosKind::OutOfOrder { reorder_min_requests, reorder_max_wait_ms } => {
            ChaosAction::OutOfOrder {
                min_requests: (*reorder_min_requests).max(2),
                max_wait: Duration::from_millis(*reorder_max_wait_ms),
            }
        }
        ChaosKind::Stale { stale_delay_ms } => {
            ChaosAction::Stale { delay: Duration::from_millis(*stale_delay_ms) }
        }
        ChaosKind::HttpError { error_codes, error_message } => {
            let status = if error_codes.is_empty() {
                500
            } else {
                error_codes[rng.gen_range(0..error_codes.len())]
            };
            let message = if error_message.is_empty() {
                "chaos: injected error".to_string()
            } else {
                error_message.clone()
            };
            ChaosAction::HttpError { status, message }
        }
        ChaosKind::Truncate { truncate_percent } => {
            ChaosAction::Truncate { keep_percent: truncate_percent.clamp(0.0, 100.0) }
        }
        ChaosKind::BitFlip { flips } => ChaosAction::BitFlip { flips: (*flips).max(1) },
        ChaosKind::CorruptJson => ChaosAction::CorruptJson,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
