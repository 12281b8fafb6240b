//! List command: show configured fonts

use std::path::Path;
use std::process::ExitCode;

use super::{open_project, EXIT_ERROR, EXIT_SUCCESS};
use crate::config::{CliOverrides, FontConfig};

/// One-line description of a configuration's generation settings.
fn describe(font: &FontConfig) -> String {
    let size = if font.is_auto_sizing() {
        "auto".to_string()
    } else {
        format!("{}pt", font.sampling_point_size)
    };
    let mut flags = Vec::new();
    if font.kerning {
        flags.push("kerning");
    }
    if font.auto_update {
        flags.push("auto-update");
    }

    let mut line = format!(
        "{}x{} {} size={} padding={}",
        font.atlas_width(),
        font.atlas_height(),
        font.render_mode,
        size,
        font.padding
    );
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    line
}

/// Run the list command
pub fn run_list(config: Option<&Path>, overrides: &CliOverrides, json: bool) -> ExitCode {
    let project = match open_project(config, overrides) {
        Ok(project) => project,
        Err(code) => return code,
    };

    if json {
        return match serde_json::to_string_pretty(&project.config.fonts) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    if project.config.fonts.is_empty() {
        println!("No font configurations in {}", project.config_path.display());
        return ExitCode::from(EXIT_SUCCESS);
    }

    for (name, font) in &project.config.fonts {
        println!("{}", name);
        println!("  asset:      {}", font.font_asset.display());
        println!("  font:       {}", font.source_font.display());
        println!("  characters: {}", font.character_list.display());
        println!("  settings:   {}", describe(font));
    }

    ExitCode::from(EXIT_SUCCESS)
}
