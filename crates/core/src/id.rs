// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process and proxy identity.
//!
//! Managed processes are keyed by an opaque caller-assigned [`ProcessId`].
//! Proxies are keyed by a compound [`ProxyId`] of the form
//! `{project-hash}:{proxy-name}:{host-port}`, where the project hash is
//! derived from the project's filesystem path so restarts of the same
//! project produce the same key.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Opaque caller-assigned identifier for a managed process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProcessId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ProcessId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Stable short hash for a project path: `{dir-basename}-{4 hex}`.
///
/// The basename keeps keys human-readable; the hash suffix keeps two
/// checkouts with the same directory name distinguishable.
pub fn project_hash(project_path: &Path) -> String {
    let base = project_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());
    let digest = Sha256::digest(project_path.to_string_lossy().as_bytes());
    format!("{}-{:02x}{:02x}", base, digest[0], digest[1])
}

/// Errors parsing a compound proxy ID.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyIdError {
    #[error("compound ID must have 3 ':'-separated components, got {0}")]
    ComponentCount(usize),
    #[error("compound ID has an empty component")]
    EmptyComponent,
}

/// Compound proxy identifier `{project-hash}:{proxy-name}:{host-port}`.
///
/// The host-port component uses `-` between host and port (`:` is the
/// compound separator), e.g. `localhost-3465`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyId {
    project_hash: String,
    name: String,
    host_port: String,
}

impl ProxyId {
    /// Build the canonical key for a proxy serving `name` for the project
    /// at `project_path`, listening on `host:port`.
    pub fn derive(project_path: &Path, name: &str, host: &str, port: u16) -> Self {
        Self {
            project_hash: project_hash(project_path),
            name: name.to_string(),
            host_port: format!("{}-{}", host, port),
        }
    }

    /// Parse a full compound ID. Exactly three non-empty components.
    pub fn parse(s: &str) -> Result<Self, ProxyIdError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(ProxyIdError::ComponentCount(parts.len()));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ProxyIdError::EmptyComponent);
        }
        Ok(Self {
            project_hash: parts[0].to_string(),
            name: parts[1].to_string(),
            host_port: parts[2].to_string(),
        })
    }

    pub fn project_hash(&self) -> &str {
        &self.project_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// The three components in order.
    pub fn components(&self) -> [&str; 3] {
        [&self.project_hash, &self.name, &self.host_port]
    }

    /// True when any single component is exactly `query`.
    ///
    /// This is the fuzzy-lookup predicate: `dev` matches
    /// `lib-e2c4:dev:localhost-3465` but `de` does not.
    pub fn has_component(&self, query: &str) -> bool {
        self.components().iter().any(|c| *c == query)
    }
}

impl std::fmt::Display for ProxyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.project_hash, self.name, self.host_port)
    }
}

impl Serialize for ProxyId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProxyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ProxyId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
