//! Configuration loading and discovery for `atlaswatch.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{AtlaswatchConfig, FontConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "atlaswatch.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No config file given and none found above the working directory
    #[error("No {} found in the current directory or any parent", CONFIG_FILE_NAME)]
    NotFound,
    /// File I/O error
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML parsing error
    #[error("Failed to parse atlaswatch.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// A font name passed on the command line has no `[fonts.<name>]` entry
    #[error("Unknown font configuration '{0}'")]
    UnknownFont(String),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the asset root
    pub root: Option<PathBuf>,
    /// Override the watch debounce delay
    pub debounce_ms: Option<u32>,
}

/// A loaded configuration together with the directory its paths resolve against.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: AtlaswatchConfig,
    /// Location of the atlaswatch.toml that was loaded
    pub config_path: PathBuf,
    /// Asset root: the config directory joined with `project.root`
    pub root: PathBuf,
}

impl Project {
    /// Font configurations selected by name, in config order.
    ///
    /// An empty `names` selects every configuration.
    pub fn select(&self, names: &[String]) -> Result<Vec<(String, FontConfig)>, ConfigError> {
        if names.is_empty() {
            return Ok(self.config.fonts.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }

        names
            .iter()
            .map(|name| {
                self.config
                    .fonts
                    .get(name)
                    .map(|font| (name.clone(), font.clone()))
                    .ok_or_else(|| ConfigError::UnknownFont(name.clone()))
            })
            .collect()
    }

    /// Configurations that opted into automatic rebuilds.
    pub fn auto_update_fonts(&self) -> Vec<(String, FontConfig)> {
        self.config
            .fonts
            .iter()
            .filter(|(_, font)| font.auto_update)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Resolve a config-relative path against the asset root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.root, path)
    }
}

/// Find atlaswatch.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find atlaswatch.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a project from an explicit config path or by discovery.
pub fn load_project(path: Option<&Path>) -> Result<Project, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => find_config().ok_or(ConfigError::NotFound)?,
    };

    let config = load_config_file(&config_path)?;
    let base = project_root(&config_path).unwrap_or_else(|| Path::new("."));
    let root = resolve_path(base, &config.project.root);

    Ok(Project { config, config_path, root })
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<AtlaswatchConfig, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let config: AtlaswatchConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Merge CLI overrides into a project.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(project: &mut Project, overrides: &CliOverrides) {
    if let Some(ref root) = overrides.root {
        project.root = root.clone();
        project.config.project.root = root.clone();
    }

    if let Some(debounce_ms) = overrides.debounce_ms {
        project.config.watch.debounce_ms = debounce_ms;
    }
}

/// Get the directory containing a config file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(body.as_bytes())
            .expect("should write config content");
        config_path
    }

    const TWO_FONTS: &str = r#"
[project]
name = "game"
root = "Assets"

[fonts.body]
font_asset = "Fonts/Body SDF.asset"
source_font = "Fonts/Body.ttf"
character_list = "Fonts/body.txt"
auto_update = true

[fonts.title]
font_asset = "Fonts/Title SDF.asset"
source_font = "Fonts/Title.ttf"
character_list = "Fonts/title.txt"
"#;

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project]\nname = \"test\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project]\nname = \"test\"");

        let subdir = temp.path().join("Assets").join("Fonts");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_project_resolves_root() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), TWO_FONTS);

        let project = load_project(Some(&config_path)).expect("should load valid config");
        assert_eq!(project.config.project.name, "game");
        assert_eq!(project.root, temp.path().join("Assets"));
        assert_eq!(
            project.resolve(Path::new("Fonts/body.txt")),
            temp.path().join("Assets/Fonts/body.txt")
        );
    }

    #[test]
    fn test_load_project_missing_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_project(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "this is not valid toml {{{");

        let result = load_config_file(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project]\nname = \"\"\n");

        let result = load_config_file(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_select_fonts() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), TWO_FONTS);
        let project = load_project(Some(&config_path)).unwrap();

        let all = project.select(&[]).unwrap();
        assert_eq!(all.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(), ["body", "title"]);

        let one = project.select(&["title".to_string()]).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].0, "title");

        let err = project.select(&["missing".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFont(name) if name == "missing"));
    }

    #[test]
    fn test_auto_update_fonts() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), TWO_FONTS);
        let project = load_project(Some(&config_path)).unwrap();

        let auto = project.auto_update_fonts();
        assert_eq!(auto.len(), 1);
        assert_eq!(auto[0].0, "body");
    }

    #[test]
    fn test_merge_cli_overrides() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), TWO_FONTS);
        let mut project = load_project(Some(&config_path)).unwrap();

        let overrides =
            CliOverrides { root: Some(PathBuf::from("/elsewhere")), debounce_ms: Some(500) };
        merge_cli_overrides(&mut project, &overrides);
        assert_eq!(project.root, PathBuf::from("/elsewhere"));
        assert_eq!(project.config.watch.debounce_ms, 500);
    }

    #[test]
    fn test_resolve_path_absolute() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("/other/path")), PathBuf::from("/other/path"));
    }

    #[test]
    fn test_resolve_path_relative() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("Fonts")), PathBuf::from("/project/Fonts"));
    }
}
