// SPDX-License-Identifier: MIT OR Apache-2.0
//! Front-end errors.

use sceneweave_graph::{CommandError, ImportError, SceneError};
use std::path::PathBuf;
use thiserror::Error;

/// Anything that stops a command from finishing
#[derive(Debug, Error)]
pub enum AppError {
    /// File could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Settings file is not valid RON
    #[error("Invalid settings in {}: {source}", path.display())]
    Settings {
        /// Settings file
        path: PathBuf,
        /// Parse error
        source: ron::error::SpannedError,
    },

    /// Settings could not be encoded
    #[error("Could not encode settings: {0}")]
    Encode(#[from] ron::Error),

    /// Scene could not be loaded or saved
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Scene root is missing or unusable
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    /// Edit was rejected
    #[error("Edit rejected: {0}")]
    Command(#[from] CommandError),

    /// No node carries the given name
    #[error("No node named {0:?}")]
    NodeNotFound(String),

    /// The requested parent cannot take the node
    #[error("{node:?} cannot be placed under {parent:?}")]
    InvalidParent {
        /// Node being moved
        node: String,
        /// Requested parent
        parent: String,
    },

    /// Report could not be encoded
    #[error("Could not encode report: {0}")]
    Json(#[from] serde_json::Error),
}
