// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sceneweave")]
#[command(about = "Import, inspect and edit scene graphs without a UI", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Editor settings file (RON). Defaults apply when absent.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Print reports as JSON regardless of the settings file
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a scene and print a summary with every diagnostic
    Inspect {
        /// Scene description (RON)
        scene: PathBuf,
    },

    /// Import a scene and fail when anything had to be repaired
    Check {
        /// Scene description (RON)
        scene: PathBuf,
    },

    /// Move a node under a new parent and save the edited scene
    Reparent {
        /// Scene description (RON)
        scene: PathBuf,

        /// Name of the node to move
        #[arg(long)]
        node: String,

        /// Name of the new parent
        #[arg(long)]
        parent: String,

        /// Where to write the edited scene
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Write the settings in effect (file values over defaults) as RON
    Settings {
        /// Where to write the settings
        #[arg(long, short)]
        output: PathBuf,
    },
}
