// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! devtool-proxy: instrumenting HTTP reverse proxies.
//!
//! Each proxy listens on a loopback port, forwards requests to a dev
//! server, injects a bootstrap script into HTML responses, routes every
//! request through the chaos engine, and appends structured events to a
//! per-proxy ring. The [`ProxyManager`] keys proxies by compound ID and
//! resolves fuzzy lookups for the RPC surface.

pub mod apply;
pub mod control;
pub mod error;
pub mod inject;
pub mod manager;
pub mod port;
pub mod reorder;
pub mod server;

pub use control::ControlCommand;
pub use error::ProxyError;
pub use manager::ProxyManager;
pub use port::derive_port;
pub use server::{ProxyConfig, ProxyInfo, ProxyServer};
