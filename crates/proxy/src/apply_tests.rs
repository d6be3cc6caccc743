// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use http_body_util::BodyExt;

#[test]
fn truncate_keeps_leading_fraction() {
    let body = Bytes::from_static(b"0123456789");
    assert_eq!(truncate(&body, 50.0), Bytes::from_static(b"01234"));
    assert_eq!(truncate(&body, 0.0), Bytes::new());
    assert_eq!(truncate(&body, 100.0), body);
}

#[test]
fn bit_flip_changes_exactly_the_drawn_bits() {
    let body = Bytes::from_static(&[0u8; 4]);
    // Draws bit 0, then bit 9.
    let mut draws = [0u64, 9].into_iter();
    let out = bit_flip(&body, 2, |_| draws.next().unwrap_or(0));
    assert_eq!(&out[..], &[0b0000_0001, 0b0000_0010, 0, 0]);
}

#[test]
fn bit_flip_on_empty_body_is_noop() {
    let body = Bytes::new();
    assert_eq!(bit_flip(&body, 8, |_| 0), body);
}

#[test]
fn corrupt_json_drops_an_object_key() {
    let body = Bytes::from_static(br#"{"a":1,"b":2}"#);
    let out = corrupt_json(&body, |_| 0);
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let map = value.as_object().unwrap();
    assert_eq!(map.len(), 1);
}

#[test]
fn corrupt_json_shrinks_an_array() {
    let body = Bytes::from_static(b"[1,2,3]");
    let out = corrupt_json(&body, |_| 1);
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
}

#[test]
fn corrupt_json_nulls_scalars() {
    let body = Bytes::from_static(b"42");
    let out = corrupt_json(&body, |_| 0);
    assert_eq!(&out[..], b"null");
}

#[test]
fn corrupt_json_falls_back_on_invalid_input() {
    let body = Bytes::from_static(b"not json at all");
    let out = corrupt_json(&body, |_| 3);
    assert_eq!(out.len(), body.len());
    assert_ne!(out, body);
}

#[tokio::test]
async fn drip_body_delivers_everything() {
    let body = drip_body(
        Bytes::from_static(b"abcdefghij"),
        3,
        std::time::Duration::from_millis(5),
    );
    let collected = body.collect().await.unwrap().to_bytes();
    assert_eq!(collected, Bytes::from_static(b"abcdefghij"));
}

#[tokio::test]
async fn disconnect_body_errors_after_cut() {
    let mut body = disconnect_body(Bytes::from_static(b"0123456789"), Some(4), None);
    let mut received = Vec::new();
    let mut saw_error = false;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(f) => {
                if let Some(data) = f.data_ref() {
                    received.extend_from_slice(data);
                }
            }
            Err(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe);
                saw_error = true;
                break;
            }
        }
    }
    assert_eq!(received, b"0123");
    assert!(saw_error);
}

#[tokio::test]
async fn disconnect_body_percent_cut() {
    let mut body = disconnect_body(Bytes::from_static(b"0123456789"), None, Some(30.0));
    let mut received = Vec::new();
    while let Some(Ok(f)) = body.frame().await {
        if let Some(data) = f.data_ref() {
            received.extend_from_slice(data);
        }
    }
    assert_eq!(received, b"012");
}
