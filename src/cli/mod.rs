//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod list;
mod update;
mod watch;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use crate::asset::FsAssetStore;
use crate::config::{load_project, merge_cli_overrides, CliOverrides, Project};
use crate::dispatch::Dispatcher;
use crate::engine::{EngineSlot, FontdueEngine};
use crate::progress::ProgressReporter;
use crate::updater::RebuildContext;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// atlaswatch - Keep font atlas assets in sync with their character lists
#[derive(Parser)]
#[command(name = "atlaswatch")]
#[command(about = "Rebuild signed-distance-field font atlases from character lists")]
#[command(version)]
pub struct Cli {
    /// Path to atlaswatch.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the asset root
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild font assets for the named configurations
    Update {
        /// Configuration names from [fonts.<name>]
        names: Vec<String>,

        /// Rebuild every configuration
        #[arg(long, conflicts_with = "names")]
        all: bool,

        /// Emit progress as JSON lines
        #[arg(long)]
        json: bool,

        /// Show what would be rebuilt without rendering
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch character lists and rebuild auto-updating configurations
    Watch {
        /// Debounce delay in milliseconds
        #[arg(long)]
        debounce: Option<u32>,

        /// Keep terminal output between rebuilds
        #[arg(long)]
        no_clear: bool,
    },

    /// List font configurations
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Load the project, applying command-line overrides.
pub(crate) fn open_project(
    config: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<Project, ExitCode> {
    match load_project(config) {
        Ok(mut project) => {
            merge_cli_overrides(&mut project, overrides);
            tracing::debug!(config = %project.config_path.display(), root = %project.root.display(), "project loaded");
            Ok(project)
        }
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            Err(ExitCode::from(EXIT_ERROR))
        }
    }
}

/// Rebuild context backed by the fontdue engine and the project's files.
pub(crate) fn rebuild_context(
    project: &Project,
    dispatcher: &Dispatcher,
    reporter: Arc<dyn ProgressReporter>,
) -> RebuildContext {
    RebuildContext::new(
        EngineSlot::new(Arc::new(FontdueEngine::new())),
        Arc::new(Mutex::new(FsAssetStore::new(&project.root))),
        dispatcher.handle(),
        reporter,
        &project.root,
    )
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> ExitCode {
    let overrides = CliOverrides { root: cli.root.clone(), ..Default::default() };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Update { names, all, json, dry_run } => {
            update::run_update(config, &overrides, &names, all, json, dry_run, cli.verbose)
        }
        Commands::Watch { debounce, no_clear } => {
            let overrides = CliOverrides { debounce_ms: debounce, ..overrides };
            watch::run_watch(config, &overrides, no_clear, cli.verbose)
        }
        Commands::List { json } => list::run_list(config, &overrides, json),
    }
}
