// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

#[test]
fn derivation_is_stable() {
    let path = PathBuf::from("/home/dev/lib");
    let a = derive_port("http://localhost:3000", &path);
    let b = derive_port("http://localhost:3000", &path);
    assert_eq!(a, b);
}

#[test]
fn derivation_is_in_range() {
    for i in 0..200 {
        let port = derive_port(
            &format!("http://localhost:{}", 3000 + i),
            &PathBuf::from("/home/dev/app"),
        );
        assert!(port >= PORT_RANGE_START);
        assert!(port < PORT_RANGE_START + PORT_RANGE_LEN);
    }
}

#[test]
fn inputs_change_the_port() {
    let path = PathBuf::from("/home/dev/lib");
    let a = derive_port("http://localhost:3000", &path);
    let b = derive_port("http://localhost:3001", &path);
    let c = derive_port("http://localhost:3000", &PathBuf::from("/home/dev/other"));
    assert!(a != b || a != c);
}
