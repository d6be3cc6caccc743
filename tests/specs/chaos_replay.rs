// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chaos reproducibility specs.

use devtool_chaos::{preset_rules, ChaosAction, ChaosConfig, ChaosEngine};

/// Seed 12345, the flaky-api preset, 100 recorded
/// requests, run twice. Injected errors and latencies match exactly.
#[test]
fn flaky_api_replay_is_identical() {
    let trace: Vec<(String, String)> = (0..100)
        .map(|i| ("GET".to_string(), format!("/api/resource/{}", i % 7)))
        .collect();

    let run = || {
        let engine = ChaosEngine::new(ChaosConfig {
            rules: preset_rules("flaky-api").unwrap(),
            seed: Some(12345),
        })
        .unwrap();
        trace.iter().map(|(m, u)| engine.evaluate(m, u)).collect::<Vec<_>>()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);

    let errors: Vec<&ChaosAction> = first
        .iter()
        .flatten()
        .filter(|a| matches!(a, ChaosAction::HttpError { .. }))
        .collect();
    let latencies: Vec<&ChaosAction> = first
        .iter()
        .flatten()
        .filter(|a| matches!(a, ChaosAction::Latency { .. }))
        .collect();
    // flaky-api injects latency on every request and errors on ~10%.
    assert_eq!(latencies.len(), 100);
    assert!(!errors.is_empty());
}

/// Determinism holds end to end: two engines with one seed driving the
/// same request list inject the same status codes in the same order.
#[test]
fn seeded_engines_agree_on_status_sequences() {
    let statuses = |seed: u64| -> Vec<Option<u16>> {
        let engine = ChaosEngine::new(ChaosConfig {
            rules: preset_rules("rate-limited").unwrap(),
            seed: Some(seed),
        })
        .unwrap();
        (0..200)
            .map(|i| {
                engine
                    .evaluate("GET", &format!("/api/{}", i))
                    .iter()
                    .find_map(|a| match a {
                        ChaosAction::HttpError { status, .. } => Some(*status),
                        _ => None,
                    })
            })
            .collect()
    };

    assert_eq!(statuses(7), statuses(7));
    assert_ne!(statuses(7), statuses(8));
}
