// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::rule::ChaosKind;
use yare::parameterized;

#[parameterized(
    mobile_3g = { "mobile-3g" },
    mobile_4g = { "mobile-4g" },
    flaky_api = { "flaky-api" },
    race_condition = { "race-condition" },
    stale_tab = { "stale-tab" },
    slow_connection = { "slow-connection" },
    connection_drops = { "connection-drops" },
    data_corruption = { "data-corruption" },
    rate_limited = { "rate-limited" },
    auth_failures = { "auth-failures" },
    service_degradation = { "service-degradation" },
    pressure_test = { "pressure-test" },
)]
fn every_listed_preset_resolves(name: &str) {
    let rules = preset_rules(name).unwrap();
    assert!(!rules.is_empty());
    for rule in &rules {
        assert!(rule.enabled);
        assert!((0.0..=1.0).contains(&rule.probability));
    }
}

#[test]
fn unknown_preset_is_none() {
    assert!(preset_rules("wifi-6").is_none());
}

#[test]
fn names_and_rules_agree() {
    for name in preset_names() {
        assert!(preset_rules(name).is_some(), "preset {} missing", name);
    }
}

#[test]
fn mobile_3g_composition() {
    let rules = preset_rules("mobile-3g").unwrap();
    assert_eq!(rules.len(), 2);
    match &rules[0].kind {
        ChaosKind::Latency { min_ms, max_ms, .. } => {
            assert_eq!((*min_ms, *max_ms), (200, 2000));
        }
        other => panic!("wrong kind: {:?}", other),
    }
    assert_eq!(rules[1].kind, ChaosKind::PacketLoss);
    assert!((rules[1].probability - 0.02).abs() < f64::EPSILON);
}

#[test]
fn flaky_api_error_codes() {
    let rules = preset_rules("flaky-api").unwrap();
    let err = rules
        .iter()
        .find_map(|r| match &r.kind {
            ChaosKind::HttpError { error_codes, .. } => Some(error_codes.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(err, vec![500, 502, 503]);
}

#[test]
fn stale_tab_is_three_hours() {
    let rules = preset_rules("stale-tab").unwrap();
    assert_eq!(rules[0].kind, ChaosKind::Stale { stale_delay_ms: 10_800_000 });
}

#[test]
fn pressure_test_unions_all_other_presets() {
    let union = preset_rules("pressure-test").unwrap();
    let individual: usize = preset_names()
        .iter()
        .filter(|n| **n != "pressure-test")
        .map(|n| preset_rules(n).unwrap().len())
        .sum();
    assert_eq!(union.len(), individual);

    // Rule ids stay unique across the union.
    let mut ids: Vec<&str> = union.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), union.len());
}
