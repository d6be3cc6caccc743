// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ring buffer overflow specs.

use devtool_core::RingBuffer;

#[test]
fn overflow_keeps_the_newest_bytes() {
    let ring = RingBuffer::new(10);
    ring.write(b"12345");
    ring.write(b"67890");
    ring.write(b"ABCDE");
    let (bytes, truncated) = ring.snapshot();
    assert_eq!(bytes, b"67890ABCDE");
    assert!(truncated);
}

#[test]
fn retained_bytes_never_exceed_capacity() {
    let ring = RingBuffer::new(1024);
    for i in 0..1000 {
        ring.write(format!("line {}\n", i).as_bytes());
    }
    let (bytes, truncated) = ring.snapshot();
    assert_eq!(bytes.len(), 1024);
    assert!(truncated);
    // Snapshot ends with the newest write.
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.ends_with("line 999\n"));
}
