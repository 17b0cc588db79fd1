// SPDX-License-Identifier: MIT OR Apache-2.0
//! `SceneWeave` - headless scene graph editor
//!
//! Drives the graph engine end to end without a UI:
//! - `inspect` imports a scene and reports what was built
//! - `check` fails when the import had to repair anything
//! - `reparent` edits the graph through a session and writes the scene back
//! - `settings` writes the settings in effect, as a starting point for a file
//!
//! ## Usage
//!
//! ```bash
//! sceneweave inspect scene.ron
//! sceneweave reparent scene.ron --node Blade --parent Arm -o edited.ron
//! sceneweave settings -o sceneweave.ron
//! ```

mod cli;
mod edit;
mod error;
mod report;
mod settings;

use clap::Parser;
use cli::{Cli, Command};
use error::AppError;
use report::SceneReport;
use sceneweave_graph::{import, SceneDocument};
use settings::{EditorSettings, ReportFormat};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exit code of `check` when the scene needed repairs
const EXIT_DIAGNOSTICS: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match EditorSettings::load_or_default(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins over the settings file
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting SceneWeave v{}", env!("CARGO_PKG_VERSION"));

    let format = if cli.json { ReportFormat::Json } else { settings.report };
    match run(&cli.command, &settings, format) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command, settings: &EditorSettings, format: ReportFormat) -> Result<u8, AppError> {
    match command {
        Command::Inspect { scene } => {
            let report = inspect(scene)?;
            println!("{}", report.render(format)?.trim_end());
            Ok(0)
        }
        Command::Check { scene } => {
            let report = inspect(scene)?;
            if report.diagnostics.is_empty() {
                tracing::info!("{} is clean", scene.display());
                return Ok(0);
            }
            println!("{}", report.render(format)?.trim_end());
            Ok(EXIT_DIAGNOSTICS)
        }
        Command::Reparent {
            scene,
            node,
            parent,
            output,
        } => {
            let doc = SceneDocument::load(scene)?;
            let outcome = edit::reparent(doc, &settings.history, node, parent)?;
            if !outcome.changed {
                tracing::info!("{node:?} is already under {parent:?}");
            }
            outcome.document.save(output)?;
            tracing::info!("Wrote {}", output.display());
            Ok(0)
        }
        Command::Settings { output } => {
            settings.save(output)?;
            tracing::info!("Wrote {}", output.display());
            Ok(0)
        }
    }
}

/// Import `path` and summarise the result
fn inspect(path: &Path) -> Result<SceneReport, AppError> {
    let doc = SceneDocument::load(path)?;
    let imported = import(&doc)?;
    Ok(SceneReport::new(&imported.registry, &imported.diagnostics))
}
