// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, overwrite-oldest log rings.
//!
//! [`RingBuffer`] is a byte ring for child stdout/stderr capture;
//! [`EventRing`] is a structured ring for proxy events with strictly
//! increasing sequence numbers. Writes never block and never error:
//! when a ring is full the oldest data is dropped and the `truncated`
//! flag is set until the next reset.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Default byte-ring capacity (64 KiB).
pub const DEFAULT_RING_CAPACITY: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte ring
// ---------------------------------------------------------------------------

struct RingState {
    buf: Vec<u8>,
    /// Index of the oldest byte.
    start: usize,
    /// Number of live bytes (≤ capacity).
    len: usize,
    truncated: bool,
}

/// Fixed-capacity byte ring with a short critical section per write.
///
/// Cloning shares the underlying ring: the pump task writing a child's
/// stdout and the snapshot reader hold clones of the same handle.
#[derive(Clone)]
pub struct RingBuffer {
    cap: usize,
    state: Arc<Mutex<RingState>>,
}

impl RingBuffer {
    /// Create a ring retaining at most `cap` bytes. A zero capacity is
    /// bumped to 1 so the arithmetic below never divides by zero.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            state: Arc::new(Mutex::new(RingState {
                buf: vec![0; cap],
                start: 0,
                len: 0,
                truncated: false,
            })),
        }
    }

    /// Ring capacity in bytes.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append `p`, dropping the oldest bytes on overflow. Never blocks
    /// beyond the internal lock, never returns short.
    pub fn write(&self, p: &[u8]) {
        if p.is_empty() {
            return;
        }
        let mut s = self.state.lock();

        // Oversized writes keep only the tail `cap` bytes.
        if p.len() >= self.cap {
            let tail = &p[p.len() - self.cap..];
            s.buf.copy_from_slice(tail);
            s.start = 0;
            s.len = self.cap;
            s.truncated = true;
            return;
        }

        // Drop the oldest bytes to make room.
        let overflow = (s.len + p.len()).saturating_sub(self.cap);
        if overflow > 0 {
            s.start = (s.start + overflow) % self.cap;
            s.len -= overflow;
            s.truncated = true;
        }

        let mut write_at = (s.start + s.len) % self.cap;
        for &b in p {
            s.buf[write_at] = b;
            write_at = (write_at + 1) % self.cap;
        }
        s.len += p.len();
    }

    /// In-order copy of the retained bytes plus the truncated flag.
    pub fn snapshot(&self) -> (Vec<u8>, bool) {
        let s = self.state.lock();
        let mut out = Vec::with_capacity(s.len);
        for i in 0..s.len {
            out.push(s.buf[(s.start + i) % self.cap]);
        }
        (out, s.truncated)
    }

    /// Clear contents and the truncated flag.
    pub fn reset(&self) {
        let mut s = self.state.lock();
        s.start = 0;
        s.len = 0;
        s.truncated = false;
    }

    /// Number of bytes currently retained.
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.lock();
        f.debug_struct("RingBuffer")
            .field("cap", &self.cap)
            .field("len", &s.len)
            .field("truncated", &s.truncated)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Structured event ring
// ---------------------------------------------------------------------------

/// One entry in an [`EventRing`]: the payload plus its sequence number
/// and wall-clock timestamp (epoch milliseconds, stamped by the writer).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub at_ms: u64,
    pub entry: T,
}

#[derive(Debug)]
struct EventRingState<T> {
    entries: VecDeque<Sequenced<T>>,
    next_seq: u64,
    truncated: bool,
}

/// Bounded structured-event ring with drop-oldest overflow.
///
/// Sequence numbers are strictly increasing within one ring and survive
/// entry eviction, so a reader can detect gaps after overflow.
#[derive(Debug, Clone)]
pub struct EventRing<T> {
    cap: usize,
    state: Arc<Mutex<EventRingState<T>>>,
}

impl<T: Clone> EventRing<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            state: Arc::new(Mutex::new(EventRingState {
                entries: VecDeque::with_capacity(cap),
                next_seq: 0,
                truncated: false,
            })),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append an entry, returning its assigned sequence number.
    pub fn push(&self, at_ms: u64, entry: T) -> u64 {
        let mut s = self.state.lock();
        let seq = s.next_seq;
        s.next_seq += 1;
        if s.entries.len() == self.cap {
            s.entries.pop_front();
            s.truncated = true;
        }
        s.entries.push_back(Sequenced { seq, at_ms, entry });
        seq
    }

    /// Oldest→newest copy of the retained entries plus the truncated flag.
    pub fn snapshot(&self) -> (Vec<Sequenced<T>>, bool) {
        let s = self.state.lock();
        (s.entries.iter().cloned().collect(), s.truncated)
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear contents and the truncated flag. The sequence counter is
    /// not reset: seq numbers stay monotonic for the ring's lifetime.
    pub fn clear(&self) {
        let mut s = self.state.lock();
        s.entries.clear();
        s.truncated = false;
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
