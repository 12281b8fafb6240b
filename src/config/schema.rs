//! Configuration schema types for `atlaswatch.toml`
//!
//! Defines the structure and validation rules for font rebuild configurations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::engine::{FaceStyle, PackingMethod, RenderMode};

/// Point size used when sampling is in auto mode.
pub const AUTO_SAMPLING_POINT_SIZE: u32 = 72;

/// How the sampling point size is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPointSize {
    /// Engine picks the largest size that fits the atlas
    #[default]
    Auto,
    /// Use `sampling_point_size` as given
    Custom,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Asset root, relative to the config file
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// One font rebuild configuration (`[fonts.<name>]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    /// Target font asset, relative to the asset root
    pub font_asset: PathBuf,
    /// Source font file (.ttf/.otf)
    pub source_font: PathBuf,
    /// Character list file whose contents are rendered
    pub character_list: PathBuf,
    /// Sampling point size mode
    #[serde(default)]
    pub sampling_point_size_mode: SamplingPointSize,
    /// Explicit point size, used in custom mode
    #[serde(default)]
    pub sampling_point_size: u32,
    /// Padding around each glyph in pixels
    #[serde(default = "default_padding")]
    pub padding: u32,
    /// Glyph packing strategy
    #[serde(default)]
    pub packing_method: PackingMethod,
    /// Atlas dimensions [width, height]
    #[serde(default = "default_atlas_resolution")]
    pub atlas_resolution: [u32; 2],
    /// Face style
    #[serde(default)]
    pub font_style: FaceStyle,
    /// Style strength (bold weight, outline width)
    #[serde(default = "default_style_modifier")]
    pub font_style_modifier: f32,
    /// Rasterization mode
    #[serde(default)]
    pub render_mode: RenderMode,
    /// Extract kerning pairs
    #[serde(default)]
    pub kerning: bool,
    /// Rebuild automatically when the character list changes
    #[serde(default)]
    pub auto_update: bool,
}

fn default_padding() -> u32 {
    5
}

fn default_atlas_resolution() -> [u32; 2] {
    [1024, 1024]
}

fn default_style_modifier() -> f32 {
    2.0
}

impl FontConfig {
    /// Create a configuration with default generation parameters.
    pub fn new(
        font_asset: impl Into<PathBuf>,
        source_font: impl Into<PathBuf>,
        character_list: impl Into<PathBuf>,
    ) -> Self {
        Self {
            font_asset: font_asset.into(),
            source_font: source_font.into(),
            character_list: character_list.into(),
            sampling_point_size_mode: SamplingPointSize::Auto,
            sampling_point_size: 0,
            padding: default_padding(),
            packing_method: PackingMethod::Fast,
            atlas_resolution: default_atlas_resolution(),
            font_style: FaceStyle::Normal,
            font_style_modifier: default_style_modifier(),
            render_mode: RenderMode::DistanceField16,
            kerning: false,
            auto_update: false,
        }
    }

    pub fn is_auto_sizing(&self) -> bool {
        self.sampling_point_size_mode == SamplingPointSize::Auto
    }

    /// Point size handed to the engine before rendering.
    pub fn point_size(&self) -> u32 {
        if self.is_auto_sizing() {
            AUTO_SAMPLING_POINT_SIZE
        } else {
            self.sampling_point_size
        }
    }

    pub fn atlas_width(&self) -> u32 {
        self.atlas_resolution[0]
    }

    pub fn atlas_height(&self) -> u32 {
        self.atlas_resolution[1]
    }
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true }
    }
}

/// Complete atlaswatch.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlaswatchConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Font rebuild configurations, keyed by name
    #[serde(default)]
    pub fonts: BTreeMap<String, FontConfig>,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "fonts.title.atlas_resolution")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atlaswatch.toml: '{}' {}", self.field, self.message)
    }
}

impl AtlaswatchConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        for (name, font) in &self.fonts {
            let paths = [
                ("font_asset", &font.font_asset),
                ("source_font", &font.source_font),
                ("character_list", &font.character_list),
            ];
            for (key, path) in paths {
                if path.as_os_str().is_empty() {
                    errors.push(ConfigValidationError {
                        field: format!("fonts.{}.{}", name, key),
                        message: "must be a non-empty path".to_string(),
                    });
                }
            }

            if font.atlas_resolution[0] == 0 || font.atlas_resolution[1] == 0 {
                errors.push(ConfigValidationError {
                    field: format!("fonts.{}.atlas_resolution", name),
                    message: "dimensions must be positive".to_string(),
                });
            }

            let smallest = font.atlas_width().min(font.atlas_height());
            if smallest > 0 && u64::from(font.padding) * 2 >= u64::from(smallest) {
                errors.push(ConfigValidationError {
                    field: format!("fonts.{}.padding", name),
                    message: format!(
                        "padding on both sides must be smaller than the atlas ({}px)",
                        smallest
                    ),
                });
            }

            if !font.is_auto_sizing() && font.sampling_point_size == 0 {
                errors.push(ConfigValidationError {
                    field: format!("fonts.{}.sampling_point_size", name),
                    message: "must be a positive integer in custom mode".to_string(),
                });
            }

            if !font.font_style_modifier.is_finite() || font.font_style_modifier < 0.0 {
                errors.push(ConfigValidationError {
                    field: format!("fonts.{}.font_style_modifier", name),
                    message: "must be a non-negative number".to_string(),
                });
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
