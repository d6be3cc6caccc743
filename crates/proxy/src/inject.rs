// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap-script injection into HTML responses.
//!
//! HTML passing through the proxy gets a `<script>` tag pointing at the
//! proxy-served instrumentation bundle. The tag carries a version
//! marker so a page holding a stale injection (from before a daemon
//! upgrade) can detect the mismatch and reload its bundle.

use bytes::Bytes;

/// Version stamped on the injected tag and served bundle.
pub const INJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path of the bundle endpoint on the proxy's own port.
pub const INJECT_PATH: &str = "/__devtool/inject.js";

/// The injected bootstrap tag.
pub fn script_tag() -> String {
    format!(
        "<script src=\"{}?v={}\" data-devtool=\"{}\"></script>",
        INJECT_PATH, INJECT_VERSION, INJECT_VERSION
    )
}

/// Inject the bootstrap tag into an HTML document.
///
/// Insertion point, in preference order: just before `</head>`, just
/// after `<head...>`, just after `<body...>`, else prepended. Matching
/// is ASCII-case-insensitive. Already-injected documents (the marker is
/// present) are returned unchanged.
pub fn inject_html(body: &[u8]) -> Bytes {
    let tag = script_tag();
    let haystack = String::from_utf8_lossy(body);

    if haystack.contains("data-devtool=") {
        return Bytes::copy_from_slice(body);
    }

    let lower = haystack.to_ascii_lowercase();
    let mut out = Vec::with_capacity(body.len() + tag.len());

    if let Some(idx) = lower.find("</head>") {
        out.extend_from_slice(&body[..idx]);
        out.extend_from_slice(tag.as_bytes());
        out.extend_from_slice(&body[idx..]);
        return Bytes::from(out);
    }

    for open in ["<head>", "<body"] {
        if let Some(idx) = lower.find(open) {
            // Skip to the end of the opening tag.
            if let Some(end) = lower[idx..].find('>') {
                let at = idx + end + 1;
                out.extend_from_slice(&body[..at]);
                out.extend_from_slice(tag.as_bytes());
                out.extend_from_slice(&body[at..]);
                return Bytes::from(out);
            }
        }
    }

    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(body);
    Bytes::from(out)
}

/// True when the response content type is HTML.
pub fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("text/html"))
        .unwrap_or(false)
}

/// The instrumentation bundle served at [`INJECT_PATH`].
///
/// The real browser-side payload is out of the supervisor's scope; this
/// bundle carries the version handshake and the event-posting shim the
/// control endpoints expect.
pub fn bundle() -> String {
    format!(
        r#"(() => {{
  const VERSION = "{version}";
  if (window.__devtool && window.__devtool.version === VERSION) return;
  const post = (event) => fetch("/__devtool/events", {{
    method: "POST",
    headers: {{ "content-type": "application/json" }},
    body: JSON.stringify(event),
    keepalive: true,
  }}).catch(() => {{}});
  window.__devtool = {{
    version: VERSION,
    post,
    log: (level, message) => post({{ type: "console", level, message: String(message) }}),
  }};
  window.addEventListener("error", (e) => post({{
    type: "error",
    message: String(e.message || e),
    stack: e.error && e.error.stack ? String(e.error.stack) : null,
    source: e.filename || null,
  }}));
  const stream = new EventSource("/__devtool/stream");
  stream.addEventListener("exec", (e) => {{
    try {{ (0, eval)(JSON.parse(e.data).script); }} catch (err) {{
      post({{ type: "error", message: "exec failed: " + err, stack: null, source: null }});
    }}
  }});
}})();
"#,
        version = INJECT_VERSION
    )
}

#[cfg(test)]
#[path = "inject_tests.rs"]
mod tests;
