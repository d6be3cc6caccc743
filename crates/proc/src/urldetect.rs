// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dev-server URL detection on child stdout.
//!
//! Only loopback URLs are accepted: proxying is strictly a local
//! affair, and matching arbitrary hosts printed by a child would point
//! the proxy at the open network. Callers may supply extra matcher
//! templates containing the `{url}` placeholder for tools whose output
//! the built-in pattern misses.

use regex::Regex;
use tracing::warn;

/// Loopback-host URL pattern. Substituted for `{url}` in templates.
const URL_PATTERN: &str =
    r"https?://(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1\])(?::\d+)?(?:/[^\s\x1b]*)?";

/// Placeholder templates must contain.
const PLACEHOLDER: &str = "{url}";

/// Incremental line scanner over a child's stdout.
pub struct UrlDetector {
    matchers: Vec<Regex>,
    line: String,
    found: Option<String>,
}

impl UrlDetector {
    /// Build from user templates. A template is escaped literally except
    /// for its `{url}` placeholder; templates without the placeholder or
    /// that fail to compile are skipped with a warning. The built-in
    /// bare-URL matcher always applies last.
    pub fn new(templates: &[String]) -> Self {
        let mut matchers = Vec::new();
        for template in templates {
            let Some(idx) = template.find(PLACEHOLDER) else {
                warn!(%template, "url matcher has no {{url}} placeholder, skipping");
                continue;
            };
            let prefix = regex::escape(&template[..idx]);
            let suffix = regex::escape(&template[idx + PLACEHOLDER.len()..]);
            let pattern = format!("{}({}){}", prefix, URL_PATTERN, suffix);
            match Regex::new(&pattern) {
                Ok(re) => matchers.push(re),
                Err(e) => warn!(%template, error = %e, "invalid url matcher, skipping"),
            }
        }
        match Regex::new(&format!("({})", URL_PATTERN)) {
            Ok(re) => matchers.push(re),
            Err(e) => warn!(error = %e, "built-in url pattern failed to compile"),
        }
        Self { matchers, line: String::new(), found: None }
    }

    /// The first URL seen so far, if any.
    pub fn found(&self) -> Option<&str> {
        self.found.as_deref()
    }

    /// Feed a chunk of stdout. Returns the detected URL the first time
    /// a complete line matches; afterwards always `None`.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<String> {
        if self.found.is_some() {
            return None;
        }
        self.line.push_str(&String::from_utf8_lossy(chunk));

        while let Some(nl) = self.line.find('\n') {
            let line: String = self.line.drain(..=nl).collect();
            if let Some(url) = self.scan(line.trim_end()) {
                self.found = Some(url.clone());
                self.line.clear();
                return Some(url);
            }
        }

        // Guard against a child that never prints a newline.
        if self.line.len() > 8 * 1024 {
            let keep = self.line.len() - 1024;
            self.line.drain(..keep);
        }
        None
    }

    fn scan(&self, line: &str) -> Option<String> {
        for re in &self.matchers {
            if let Some(caps) = re.captures(line) {
                if let Some(m) = caps.get(1) {
                    return Some(m.as_str().trim_end_matches(['/', '.', ',']).to_string());
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "urldetect_tests.rs"]
mod tests;
