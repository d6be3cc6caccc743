// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of proxy servers with compound-ID resolution.
//!
//! Exact lookups hit the map directly; fuzzy lookups match a single
//! compound-ID component (`dev`, `localhost-3465`, a project hash) and
//! must resolve uniquely, optionally restricted to the caller's
//! project. Stop fan-outs mirror the process manager: parallel,
//! best-effort, errors joined.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use devtool_core::{project_hash, JoinedErrors, ProxyId};
use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::port::derive_port;
use crate::server::{ProxyConfig, ProxyInfo, ProxyServer};

#[derive(Default)]
pub struct ProxyManager {
    proxies: RwLock<HashMap<ProxyId, Arc<ProxyServer>>>,
    shutting_down: AtomicBool,
    shutdown_started: AtomicBool,
}

impl ProxyManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Start a proxy and register it under its compound ID. Duplicate
    /// IDs are refused before the port is bound.
    pub async fn start(&self, config: ProxyConfig) -> Result<Arc<ProxyServer>, ProxyError> {
        if self.is_shutting_down() {
            return Err(ProxyError::ShuttingDown);
        }
        let port = if config.port == 0 {
            derive_port(&config.target_url, &config.project_path)
        } else {
            config.port
        };
        let id = ProxyId::derive(&config.project_path, &config.name, "localhost", port);
        if self.proxies.read().contains_key(&id) {
            return Err(ProxyError::Duplicate(id));
        }

        let server = ProxyServer::start(config.with_port(port)).await?;
        let mut proxies = self.proxies.write();
        if proxies.contains_key(server.id()) {
            // Lost a race with a concurrent start of the same key.
            let loser = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = loser.stop(&CancellationToken::new()).await;
            });
            return Err(ProxyError::Duplicate(server.id().clone()));
        }
        proxies.insert(server.id().clone(), Arc::clone(&server));
        Ok(server)
    }

    /// Resolve a proxy by full compound ID or by a single component.
    pub fn get(
        &self,
        query: &str,
        project_path: Option<&Path>,
    ) -> Result<Arc<ProxyServer>, ProxyError> {
        let proxies = self.proxies.read();

        if let Ok(id) = ProxyId::parse(query) {
            if let Some(server) = proxies.get(&id) {
                return Ok(Arc::clone(server));
            }
        }

        let scope = project_path.map(|p| project_hash(p));
        let id = resolve_fuzzy(proxies.keys(), query, scope.as_deref())?;
        proxies
            .get(&id)
            .cloned()
            .ok_or_else(|| ProxyError::NotFound(query.to_string()))
    }

    /// Stop a proxy and drop it from the registry.
    pub async fn stop(
        &self,
        query: &str,
        project_path: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError> {
        let server = self.get(query, project_path)?;
        server.stop(cancel).await?;
        self.proxies.write().remove(server.id());
        info!(id = %server.id(), "proxy removed");
        Ok(())
    }

    pub fn list(&self) -> Vec<ProxyInfo> {
        self.snapshot().iter().map(|p| p.info()).collect()
    }

    pub fn list_by_path(&self, path: &Path) -> Vec<ProxyInfo> {
        self.snapshot()
            .iter()
            .filter(|p| p.project_path() == path)
            .map(|p| p.info())
            .collect()
    }

    /// Best-effort parallel stop of a project's proxies.
    pub async fn stop_by_project_path(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), JoinedErrors> {
        let targets: Vec<Arc<ProxyServer>> = self
            .snapshot()
            .into_iter()
            .filter(|p| p.project_path() == path)
            .collect();
        debug!(path = %path.display(), count = targets.len(), "stopping proxies for project");
        let errors = self.stop_all(targets, cancel).await;
        JoinedErrors::from_results(errors)
    }

    /// Idempotent full shutdown with parallel fan-out.
    pub async fn shutdown(&self, cancel: &CancellationToken) -> Result<(), ProxyError> {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutting_down.store(true, Ordering::SeqCst);
        let targets = self.snapshot();
        info!(count = targets.len(), "proxy manager shutting down");
        let errors = self.stop_all(targets, cancel).await;
        JoinedErrors::from_results(errors)?;
        Ok(())
    }

    async fn stop_all(
        &self,
        targets: Vec<Arc<ProxyServer>>,
        cancel: &CancellationToken,
    ) -> Vec<(String, String)> {
        let stops = targets.iter().map(|server| {
            let server = Arc::clone(server);
            let cancel = cancel.clone();
            async move { (server.id().clone(), server.stop(&cancel).await) }
        });

        let mut errors = Vec::new();
        for (id, result) in join_all(stops).await {
            match result {
                Ok(()) => {
                    self.proxies.write().remove(&id);
                }
                Err(e) => errors.push((id.to_string(), e.to_string())),
            }
        }
        errors
    }

    fn snapshot(&self) -> Vec<Arc<ProxyServer>> {
        self.proxies.read().values().cloned().collect()
    }
}

/// Fuzzy resolution over registered compound IDs: collect every ID with
/// a component exactly equal to `query` (scoped to one project hash
/// when given); exactly one match wins.
fn resolve_fuzzy<'a>(
    ids: impl Iterator<Item = &'a ProxyId>,
    query: &str,
    scope_hash: Option<&str>,
) -> Result<ProxyId, ProxyError> {
    let matches: Vec<&ProxyId> = ids
        .filter(|id| id.has_component(query))
        .filter(|id| scope_hash.map_or(true, |h| id.project_hash() == h))
        .collect();

    match matches.len() {
        0 => Err(ProxyError::NotFound(query.to_string())),
        1 => Ok(matches[0].clone()),
        _ => Err(ProxyError::Ambiguous {
            query: query.to_string(),
            matches: matches.iter().map(|id| id.to_string()).collect(),
        }),
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
