// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recoverable anomalies collected while building a graph.

use serde::Serialize;
use std::fmt;

/// Ordered list of human-readable anomaly messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an anomaly and emit it as a warning
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.messages.push(message);
    }

    /// All messages in the order they were recorded
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Iterate over messages
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.messages.iter().map(String::as_str)
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether any message contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in &self.messages {
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}
