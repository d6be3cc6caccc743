// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_ring_snapshot() {
    let ring = RingBuffer::new(10);
    let (bytes, truncated) = ring.snapshot();
    assert!(bytes.is_empty());
    assert!(!truncated);
    assert_eq!(ring.cap(), 10);
}

#[test]
fn write_within_capacity() {
    let ring = RingBuffer::new(10);
    ring.write(b"hello");
    let (bytes, truncated) = ring.snapshot();
    assert_eq!(bytes, b"hello");
    assert!(!truncated);
}

#[test]
fn overflow_keeps_newest_bytes() {
    // Three writes into a 10-byte ring: the oldest five drop.
    let ring = RingBuffer::new(10);
    ring.write(b"12345");
    ring.write(b"67890");
    ring.write(b"ABCDE");
    let (bytes, truncated) = ring.snapshot();
    assert_eq!(bytes, b"67890ABCDE");
    assert!(truncated);
}

#[test]
fn oversized_write_keeps_tail() {
    let ring = RingBuffer::new(4);
    ring.write(b"abcdefgh");
    let (bytes, truncated) = ring.snapshot();
    assert_eq!(bytes, b"efgh");
    assert!(truncated);
}

#[test]
fn write_exactly_capacity() {
    let ring = RingBuffer::new(5);
    ring.write(b"12345");
    let (bytes, truncated) = ring.snapshot();
    assert_eq!(bytes, b"12345");
    // |p| >= cap retains the tail and reports truncation.
    assert!(truncated);
}

#[test]
fn reset_clears_contents_and_flag() {
    let ring = RingBuffer::new(4);
    ring.write(b"abcdef");
    ring.reset();
    let (bytes, truncated) = ring.snapshot();
    assert!(bytes.is_empty());
    assert!(!truncated);
    ring.write(b"xy");
    assert_eq!(ring.snapshot().0, b"xy");
}

#[test]
fn retained_length_is_min_of_written_and_cap() {
    // After B bytes into a ring of N: len = min(B, N), truncated iff B > N.
    let cases: &[(usize, &[&[u8]])] = &[
        (8, &[b"ab", b"cd"]),
        (8, &[b"abcd", b"efgh"]),
        (8, &[b"abcdefgh", b"ij"]),
        (3, &[b"a", b"b", b"c", b"d"]),
    ];
    for (cap, writes) in cases {
        let ring = RingBuffer::new(*cap);
        let total: usize = writes.iter().map(|w| w.len()).sum();
        for w in *writes {
            ring.write(w);
        }
        let (bytes, truncated) = ring.snapshot();
        assert_eq!(bytes.len(), total.min(*cap));
        assert_eq!(truncated, total > *cap);
    }
}

#[test]
fn clone_shares_state() {
    let ring = RingBuffer::new(16);
    let writer = ring.clone();
    writer.write(b"shared");
    assert_eq!(ring.snapshot().0, b"shared");
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn snapshot_is_suffix_of_writes(
            cap in 1usize..64,
            writes in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..32), 0..16),
        ) {
            let ring = RingBuffer::new(cap);
            let mut all: Vec<u8> = Vec::new();
            for w in &writes {
                ring.write(w);
                all.extend_from_slice(w);
            }
            let (bytes, truncated) = ring.snapshot();
            let keep = all.len().min(cap);
            prop_assert_eq!(&bytes[..], &all[all.len() - keep..]);
            prop_assert_eq!(truncated, all.len() > cap);
        }
    }
}

mod event_ring {
    use super::*;

    #[test]
    fn seq_numbers_strictly_increase() {
        let ring: EventRing<&str> = EventRing::new(8);
        for i in 0..5 {
            assert_eq!(ring.push(1000 + i, "e"), i);
        }
        let (entries, truncated) = ring.snapshot();
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(!truncated);
    }

    #[test]
    fn overflow_drops_oldest_and_keeps_seq() {
        let ring: EventRing<u32> = EventRing::new(3);
        for i in 0..5u32 {
            ring.push(0, i);
        }
        let (entries, truncated) = ring.snapshot();
        assert!(truncated);
        let pairs: Vec<(u64, u32)> = entries.iter().map(|e| (e.seq, e.entry)).collect();
        assert_eq!(pairs, vec![(2, 2), (3, 3), (4, 4)]);
    }

    #[test]
    fn clear_keeps_seq_monotonic() {
        let ring: EventRing<&str> = EventRing::new(4);
        ring.push(0, "a");
        ring.push(0, "b");
        ring.clear();
        assert!(ring.is_empty());
        let seq = ring.push(0, "c");
        assert_eq!(seq, 2);
    }
}
