//! Watch command

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{open_project, rebuild_context, EXIT_ERROR, EXIT_SUCCESS};
use crate::config::CliOverrides;
use crate::dispatch::Dispatcher;
use crate::progress::ConsoleProgress;
use crate::watch::{watch_and_rebuild, WatchOptions};

/// Run the watch command
pub fn run_watch(
    config: Option<&Path>,
    overrides: &CliOverrides,
    no_clear: bool,
    verbose: bool,
) -> ExitCode {
    let project = match open_project(config, overrides) {
        Ok(project) => project,
        Err(code) => return code,
    };

    let mut watch_config = project.config.watch.clone();
    if no_clear {
        watch_config.clear_screen = false;
    }

    let options = WatchOptions { root: project.root.clone(), config: watch_config, verbose };

    let mut dispatcher = Dispatcher::new();
    let reporter = Arc::new(ConsoleProgress::new().with_verbose(verbose));
    let ctx = rebuild_context(&project, &dispatcher, reporter);

    println!("Starting watch mode...");
    println!("Press Ctrl+C to stop");
    println!();

    match watch_and_rebuild(&project, options, ctx, &mut dispatcher) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
