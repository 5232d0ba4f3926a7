//! Builds the self-contained preview document from the three source buffers.
//!
//! Assembly is pure and total: every input is embedded verbatim, nothing is
//! escaped, and identical inputs always produce identical documents. User
//! script runs in its own `<script>` element after the console bridge, inside
//! a `try` block, so a failing script is reported through the bridge instead of
//! taking the instrumentation down with it.

use std::{fmt, time::Instant};

use askama::Template;
use metrics::histogram;

use crate::domain::buffers::SourceBuffers;

pub(crate) const METRIC_ASSEMBLE_MS: &str = "codebox_assemble_ms";

/// Baseline reset applied before user style.
pub const BASELINE_STYLE: &str = "* { margin: 0; padding: 0; box-sizing: border-box; }\n\
body { font-family: system-ui, -apple-system, sans-serif; }";

/// Console bridge producer injected ahead of user script.
pub const CONSOLE_BRIDGE_SNIPPET: &str = include_str!("../../assets/console_bridge.js");

#[derive(Template)]
#[template(path = "preview.html", escape = "none")]
struct PreviewDocumentTemplate<'a> {
    reset: &'a str,
    style: &'a str,
    markup: &'a str,
    instrumentation: &'a str,
    script: &'a str,
}

/// A complete, renderable preview document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument(String);

impl AssembledDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AssembledDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compose markup, style and script into one document.
pub fn assemble(markup: &str, style: &str, script: &str) -> AssembledDocument {
    let started_at = Instant::now();
    let template = PreviewDocumentTemplate {
        reset: BASELINE_STYLE,
        style,
        markup,
        instrumentation: CONSOLE_BRIDGE_SNIPPET,
        script,
    };
    // Display never fails for borrowed string fields.
    let document = AssembledDocument(template.to_string());
    histogram!(METRIC_ASSEMBLE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    document
}

pub fn assemble_buffers(buffers: &SourceBuffers) -> AssembledDocument {
    assemble(buffers.markup(), buffers.style(), buffers.script())
}
