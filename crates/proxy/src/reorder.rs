// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-order response buffering.
//!
//! Responses selected by the OutOfOrder chaos kind park here until the
//! batch is big enough (or the wait budget expires), then release in a
//! random permutation. The buffer is shared across all clients of one
//! proxy: crossing clients shakes out more race conditions than
//! per-client reordering would.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::oneshot;

#[derive(Debug)]
struct ReorderState {
    pending: Vec<oneshot::Sender<()>>,
    flush_scheduled: bool,
}

#[derive(Debug)]
pub struct ReorderBuffer {
    state: Mutex<ReorderState>,
    rng: Mutex<StdRng>,
}

/// Gap between releases, large enough for the released handler to win
/// the write race against the next one.
const RELEASE_STAGGER: Duration = Duration::from_millis(2);

impl ReorderBuffer {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(ReorderState { pending: Vec::new(), flush_scheduled: false }),
            rng: Mutex::new(rng),
        }
    }

    /// Park the calling handler until the batch flushes. Returns when
    /// this response's slot in the permutation comes up.
    pub async fn hold(self: &Arc<Self>, min_requests: usize, max_wait: Duration) {
        let (tx, rx) = oneshot::channel();
        let flush_now = {
            let mut s = self.state.lock();
            s.pending.push(tx);
            if s.pending.len() >= min_requests.max(1) {
                true
            } else {
                if !s.flush_scheduled {
                    s.flush_scheduled = true;
                    let buffer = Arc::clone(self);
                    tokio::spawn(async move {
                        tokio::time::sleep(max_wait).await;
                        buffer.flush();
                    });
                }
                false
            }
        };
        if flush_now {
            self.flush();
        }
        let _ = rx.await;
    }

    /// Number of parked responses.
    pub fn parked(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Release everything parked, permuted.
    pub fn flush(&self) {
        let mut batch = {
            let mut s = self.state.lock();
            s.flush_scheduled = false;
            std::mem::take(&mut s.pending)
        };
        if batch.is_empty() {
            return;
        }
        batch.shuffle(&mut *self.rng.lock());
        tokio::spawn(async move {
            for tx in batch {
                let _ = tx.send(());
                tokio::time::sleep(RELEASE_STAGGER).await;
            }
        });
    }
}

#[cfg(test)]
#[path = "reorder_tests.rs"]
mod tests;
