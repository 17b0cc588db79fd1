// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings stored as RON.

use crate::error::AppError;
use sceneweave_graph::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How reports are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON object on one line
    Json,
}

/// Front-end settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Session tuning
    pub history: SessionConfig,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: String,
    /// Report format
    pub report: ReportFormat,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            history: SessionConfig::default(),
            log_filter: "sceneweave_app=info,sceneweave_graph=warn".to_string(),
            report: ReportFormat::Text,
        }
    }
}

impl EditorSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| AppError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` when given and present, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Save settings as pretty RON
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let config = ron::ser::PrettyConfig::default()
            .depth_limit(4)
            .separate_tuple_members(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content).map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
