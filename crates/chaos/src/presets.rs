// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named rule bundles.
//!
//! Presets are the chaos vocabulary the RPC layer exposes: a name maps
//! to a fixed rule composition. Probabilities are fractions in [0, 1].

use crate::rule::{ChaosKind, ChaosRule};

/// All preset names, in the order they are documented.
pub fn preset_names() -> &'static [&'static str] {
    &[
        "mobile-3g",
        "mobile-4g",
        "flaky-api",
        "race-condition",
        "stale-tab",
        "slow-connection",
        "connection-drops",
        "data-corruption",
        "rate-limited",
        "auth-failures",
        "service-degradation",
        "pressure-test",
    ]
}

/// Rules for a named preset, or `None` for an unknown name.
pub fn preset_rules(name: &str) -> Option<Vec<ChaosRule>> {
    let rules = match name {
        "mobile-3g" => vec![
            latency("mobile-3g/latency", 200, 2000, 0, 1.0),
            rule("mobile-3g/loss", 0.02, ChaosKind::PacketLoss),
        ],
        "mobile-4g" => vec![
            latency("mobile-4g/latency", 50, 500, 0, 1.0),
            rule("mobile-4g/loss", 0.005, ChaosKind::PacketLoss),
        ],
        "flaky-api" => vec![
            latency("flaky-api/latency", 100, 800, 0, 1.0),
            rule(
                "flaky-api/errors",
                0.10,
                ChaosKind::HttpError {
                    error_codes: vec![500, 502, 503],
                    error_message: "flaky upstream".to_string(),
                },
            ),
            rule("flaky-api/timeout", 0.02, ChaosKind::Timeout),
        ],
        "race-condition" => vec![
            rule(
                "race-condition/reorder",
                1.0,
                ChaosKind::OutOfOrder { reorder_min_requests: 3, reorder_max_wait_ms: 500 },
            ),
            latency("race-condition/jitter", 0, 400, 300, 1.0),
        ],
        "stale-tab" => vec![rule(
            "stale-tab/stale",
            1.0,
            ChaosKind::Stale { stale_delay_ms: 3 * 60 * 60 * 1000 },
        )],
        "slow-connection" => vec![rule(
            "slow-connection/drip",
            1.0,
            ChaosKind::SlowDrip { chunk_size: 10, bytes_per_ms: 5 },
        )],
        "connection-drops" => vec![rule(
            "connection-drops/drop",
            0.10,
            ChaosKind::Disconnect { drop_after_bytes: None, drop_after_percent: Some(50.0) },
        )],
        "data-corruption" => vec![rule(
            "data-corruption/truncate",
            0.05,
            ChaosKind::Truncate { truncate_percent: 50.0 },
        )],
        "rate-limited" => vec![rule(
            "rate-limited/429",
            0.20,
            ChaosKind::HttpError {
                error_codes: vec![429],
                error_message: "rate limited".to_string(),
            },
        )],
        "auth-failures" => vec![rule(
            "auth-failures/reject",
            0.10,
            ChaosKind::HttpError {
                error_codes: vec![401, 403],
                error_message: "auth rejected".to_string(),
            },
        )],
        "service-degradation" => vec![
            latency("service-degradation/latency", 100, 600, 0, 1.0),
            rule(
                "service-degradation/errors",
                0.05,
                ChaosKind::HttpError {
                    error_codes: vec![500],
                    error_message: "degraded".to_string(),
                },
            ),
            rule(
                "service-degradation/truncate",
                0.02,
                ChaosKind::Truncate { truncate_percent: 50.0 },
            ),
        ],
        "pressure-test" => {
            // Union of every other preset.
            let mut all = Vec::new();
            for other in preset_names() {
                if *other == "pressure-test" {
                    continue;
                }
                if let Some(mut rules) = preset_rules(other) {
                    all.append(&mut rules);
                }
            }
            all
        }
        _ => return None,
    };
    Some(rules)
}

fn rule(id: &str, probability: f64, kind: ChaosKind) -> ChaosRule {
    ChaosRule::new(id, probability, kind)
}

fn latency(id: &str, min_ms: u64, max_ms: u64, jitter_ms: u64, probability: f64) -> ChaosRule {
    ChaosRule::new(id, probability, ChaosKind::Latency { min_ms, max_ms, jitter_ms })
}

#[cfg(test)]
#[path = "presets_tests.rs"]
mod tests;
