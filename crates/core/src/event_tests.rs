// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn http_event_serializes_with_type_tag() {
    let event = ProxyEvent::Http {
        method: "GET".into(),
        url: "/api/items".into(),
        status: Some(200),
        duration_ms: Some(12),
        error: None,
        chaos: vec![],
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "http");
    assert_eq!(json["status"], 200);
    assert!(json.get("error").is_none());
}

#[test]
fn console_event_roundtrip() {
    let event = ProxyEvent::Console { level: "warn".into(), message: "slow render".into() };
    let json = serde_json::to_string(&event).unwrap();
    let parsed: ProxyEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
    assert_eq!(event.type_tag(), "console");
}

#[test]
fn browser_posted_event_parses() {
    // Shape posted by the injected script to /__devtool/events.
    let json = r#"{"type":"error","message":"x is undefined","stack":"at main.js:3"}"#;
    let parsed: ProxyEvent = serde_json::from_str(json).unwrap();
    match parsed {
        ProxyEvent::Error { message, stack, source } => {
            assert_eq!(message, "x is undefined");
            assert_eq!(stack.as_deref(), Some("at main.js:3"));
            assert!(source.is_none());
        }
        other => panic!("wrong variant: {:?}", other),
    }
}

#[test]
fn type_tags_cover_all_variants() {
    let events = [
        ProxyEvent::Http {
            method: "GET".into(),
            url: "/".into(),
            status: None,
            duration_ms: None,
            error: None,
            chaos: vec![],
        },
        ProxyEvent::Console { level: "log".into(), message: String::new() },
        ProxyEvent::Error { message: String::new(), stack: None, source: None },
        ProxyEvent::Performance { metric: "fcp".into(), value: 1.5 },
        ProxyEvent::Custom { name: "mark".into(), data: serde_json::Value::Null },
    ];
    let tags: Vec<&str> = events.iter().map(|e| e.type_tag()).collect();
    assert_eq!(tags, vec!["http", "console", "error", "performance", "custom"]);
}
