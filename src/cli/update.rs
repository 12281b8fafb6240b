//! Update command: rebuild font assets on demand

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{open_project, rebuild_context, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::config::{CliOverrides, ConfigError};
use crate::dispatch::Dispatcher;
use crate::progress::{ConsoleProgress, JsonProgress, ProgressReporter};
use crate::updater::run_batch;

/// Run the update command
pub fn run_update(
    config: Option<&Path>,
    overrides: &CliOverrides,
    names: &[String],
    all: bool,
    json: bool,
    dry_run: bool,
    verbose: bool,
) -> ExitCode {
    if names.is_empty() && !all {
        eprintln!("Error: name one or more font configurations, or pass --all");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let project = match open_project(config, overrides) {
        Ok(project) => project,
        Err(code) => return code,
    };

    let fonts = match project.select(names) {
        Ok(fonts) => fonts,
        Err(e @ ConfigError::UnknownFont(_)) => {
            eprintln!("Error: {}", e);
            let known: Vec<&str> = project.config.fonts.keys().map(String::as_str).collect();
            if !known.is_empty() {
                eprintln!("Known configurations: {}", known.join(", "));
            }
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if fonts.is_empty() {
        println!("No font configurations in {}", project.config_path.display());
        return ExitCode::from(EXIT_SUCCESS);
    }

    if dry_run {
        println!("Dry run - would rebuild:");
        for (name, font) in &fonts {
            println!(
                "  {} -> {} ({} from {})",
                name,
                font.font_asset.display(),
                font.source_font.display(),
                font.character_list.display()
            );
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    let reporter: Arc<dyn ProgressReporter> = if json {
        Arc::new(JsonProgress::new())
    } else {
        Arc::new(ConsoleProgress::new().with_verbose(verbose))
    };

    let mut dispatcher = Dispatcher::new();
    let ctx = rebuild_context(&project, &dispatcher, reporter);
    let result = run_batch(&mut dispatcher, &ctx, fonts);

    if result.is_success() {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}
