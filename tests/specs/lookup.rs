// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fuzzy compound-ID lookup specs against live proxies.

use devtool_proxy::{ProxyConfig, ProxyError, ProxyManager};
use tokio_util::sync::CancellationToken;

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Two proxies named `dev` for one project: the shared
/// name is ambiguous; the host-port component and the full compound ID
/// resolve uniquely.
#[tokio::test]
async fn fuzzy_lookup_resolves_components() {
    let manager = ProxyManager::new();
    let project = std::env::temp_dir().join("lookup-spec");
    let port_a = free_port().await;
    let port_b = free_port().await;

    let first = manager
        .start(
            ProxyConfig::new("dev", &project, "http://localhost:3465").with_port(port_a),
        )
        .await
        .unwrap();
    manager
        .start(ProxyConfig::new("dev", &project, "http://localhost:4000").with_port(port_b))
        .await
        .unwrap();

    // Shared name component: ambiguous.
    let err = manager.get("dev", Some(&project)).unwrap_err();
    assert!(matches!(err, ProxyError::Ambiguous { .. }));

    // Host-port component: unique.
    let by_port = manager.get(&format!("localhost-{}", port_a), Some(&project)).unwrap();
    assert_eq!(by_port.id(), first.id());

    // Full compound ID: exact.
    let exact = manager.get(&first.id().to_string(), Some(&project)).unwrap();
    assert_eq!(exact.id(), first.id());

    // Nonsense: not found.
    assert!(matches!(
        manager.get("prod", Some(&project)).unwrap_err(),
        ProxyError::NotFound(_)
    ));

    manager.shutdown(&CancellationToken::new()).await.unwrap();
}
