// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import summaries for the terminal.

use crate::settings::ReportFormat;
use sceneweave_graph::{ConnectionRegistry, Diagnostics};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// What an import produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneReport {
    /// Number of editor nodes
    pub nodes: usize,
    /// Number of links
    pub connections: usize,
    /// Node count per kind label
    pub kinds: BTreeMap<String, usize>,
    /// Nodes that stand for no scene object
    pub synthesized: usize,
    /// Recoverable anomalies
    pub diagnostics: Diagnostics,
}

impl SceneReport {
    /// Summarise `registry` and the diagnostics of its import
    pub fn new(registry: &ConnectionRegistry, diagnostics: &Diagnostics) -> Self {
        let graph = registry.graph();
        let mut kinds = BTreeMap::new();
        let mut synthesized = 0;
        for (_, node) in graph.nodes() {
            *kinds.entry(node.kind().label()).or_insert(0) += 1;
            if node.object().is_none() {
                synthesized += 1;
            }
        }

        Self {
            nodes: graph.node_count(),
            connections: registry.connection_count(),
            kinds,
            synthesized,
            diagnostics: diagnostics.clone(),
        }
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Json => serde_json::to_string(self),
            ReportFormat::Text => Ok(self.to_text()),
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} node(s), {} connection(s)", self.nodes, self.connections);
        for (kind, count) in &self.kinds {
            let _ = writeln!(out, "  {kind}: {count}");
        }
        if self.synthesized > 0 {
            let _ = writeln!(out, "  ({} synthesized)", self.synthesized);
        }

        if self.diagnostics.is_empty() {
            out.push_str("No diagnostics\n");
        } else {
            let _ = writeln!(out, "{} diagnostic(s):", self.diagnostics.len());
            for message in self.diagnostics.iter() {
                let _ = writeln!(out, "  - {message}");
            }
        }
        out
    }
}
