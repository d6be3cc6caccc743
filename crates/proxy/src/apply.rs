// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Applying resolved chaos actions to the response path.
//!
//! Pre-response actions (latency, short-circuit errors) are handled in
//! the server's request pipeline; this module owns the body-level
//! effects: truncation, bit flips, JSON corruption, slow-drip
//! streaming, and mid-body disconnects.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use tokio_stream::wrappers::ReceiverStream;

/// Body type for every proxy response. An `Err` frame aborts the
/// connection mid-body, which is exactly what Disconnect wants.
pub type ProxyBody = BoxBody<Bytes, std::io::Error>;

pub fn full_body(bytes: Bytes) -> ProxyBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

pub fn empty_body() -> ProxyBody {
    full_body(Bytes::new())
}

/// Keep the leading `keep_percent` of the body.
pub fn truncate(body: &Bytes, keep_percent: f64) -> Bytes {
    let keep = ((body.len() as f64) * (keep_percent / 100.0)).floor() as usize;
    body.slice(..keep.min(body.len()))
}

/// Flip `flips` bits at positions drawn from `draw(len_in_bits)`.
pub fn bit_flip(body: &Bytes, flips: usize, mut draw: impl FnMut(u64) -> u64) -> Bytes {
    if body.is_empty() {
        return body.clone();
    }
    let mut out = body.to_vec();
    let bits = (out.len() as u64) * 8;
    for _ in 0..flips {
        let bit = draw(bits);
        out[(bit / 8) as usize] ^= 1 << (bit % 8);
    }
    Bytes::from(out)
}

/// Structurally mutate a JSON body: drop an object key, drop an array
/// element, or null a scalar. Bodies that fail to parse fall back to
/// bit flips so the corruption is visible either way.
pub fn corrupt_json(body: &Bytes, mut draw: impl FnMut(u64) -> u64) -> Bytes {
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return bit_flip(body, 4, draw);
    };

    match &mut value {
        serde_json::Value::Object(map) if !map.is_empty() => {
            let idx = draw(map.len() as u64) as usize;
            if let Some(key) = map.keys().nth(idx).cloned() {
                map.remove(&key);
            }
        }
        serde_json::Value::Array(items) if !items.is_empty() => {
            let idx = draw(items.len() as u64) as usize;
            items.remove(idx.min(items.len() - 1));
        }
        other => {
            *other = serde_json::Value::Null;
        }
    }

    match serde_json::to_vec(&value) {
        Ok(out) => Bytes::from(out),
        Err(_) => body.clone(),
    }
}

/// Stream the body in `chunk_size`-byte chunks, sleeping `delay`
/// between chunks.
pub fn drip_body(bytes: Bytes, chunk_size: usize, delay: Duration) -> ProxyBody {
    let chunk_size = chunk_size.max(1);
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Frame<Bytes>, std::io::Error>>(2);
    tokio::spawn(async move {
        let mut offset = 0;
        while offset < bytes.len() {
            let end = (offset + chunk_size).min(bytes.len());
            if tx.send(Ok(Frame::data(bytes.slice(offset..end)))).await.is_err() {
                return;
            }
            offset = end;
            if offset < bytes.len() {
                tokio::time::sleep(delay).await;
            }
        }
    });
    StreamBody::new(ReceiverStream::new(rx)).boxed()
}

/// Yield the leading bytes, then abort the connection.
pub fn disconnect_body(bytes: Bytes, after_bytes: Option<u64>, after_percent: Option<f64>) -> ProxyBody {
    let cut = match (after_bytes, after_percent) {
        (Some(n), _) => (n as usize).min(bytes.len()),
        (None, Some(p)) => ((bytes.len() as f64) * (p.clamp(0.0, 100.0) / 100.0)) as usize,
        (None, None) => bytes.len() / 2,
    };
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Frame<Bytes>, std::io::Error>>(2);
    tokio::spawn(async move {
        if cut > 0 {
            if tx.send(Ok(Frame::data(bytes.slice(..cut)))).await.is_err() {
                return;
            }
        }
        let _ = tx
            .send(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "chaos: connection dropped",
            )))
            .await;
    });
    StreamBody::new(ReceiverStream::new(rx)).boxed()
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
