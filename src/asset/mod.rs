//! Font asset model and persistence
//!
//! A font asset bundles face metrics, the glyph table, kerning, a reference
//! to its atlas texture and its primary material. Assets and standalone
//! materials are stored as JSON documents; textures as PNG images.

mod fs_store;
mod memory;

pub use fs_store::FsAssetStore;
pub use memory::MemoryAssetStore;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::output::OutputError;

/// Shader assigned to materials created for new distance-field assets.
pub const DISTANCE_FIELD_SHADER: &str = "Text/Distance Field";

/// Material property names written during a rebuild.
pub mod props {
    pub const TEXTURE_WIDTH: &str = "_TextureWidth";
    pub const TEXTURE_HEIGHT: &str = "_TextureHeight";
    pub const GRADIENT_SCALE: &str = "_GradientScale";
    pub const WEIGHT_NORMAL: &str = "_WeightNormal";
    pub const WEIGHT_BOLD: &str = "_WeightBold";
}

/// Kind of font asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontAssetType {
    Bitmap,
    #[default]
    Sdf,
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Point,
    #[default]
    Bilinear,
}

/// Face-wide metrics stored on an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceInfo {
    pub name: String,
    pub point_size: f32,
    pub scale: f32,
    pub padding: f32,
    pub line_height: f32,
    pub baseline: f32,
    pub ascender: f32,
    pub descender: f32,
    pub cap_height: f32,
    pub center_line: f32,
    pub underline: f32,
    pub underline_thickness: f32,
    pub strikethrough: f32,
    pub strikethrough_thickness: f32,
    pub superscript_offset: f32,
    pub subscript_offset: f32,
    pub sub_size: f32,
    pub character_count: u32,
    pub atlas_width: f32,
    pub atlas_height: f32,
}

/// One glyph as stored on the asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Glyph {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_advance: f32,
    pub scale: f32,
}

/// Kerning adjustment between two glyphs, in asset units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KerningPair {
    pub first: u32,
    pub second: u32,
    pub x_offset: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KerningTable {
    pub pairs: Vec<KerningPair>,
}

impl KerningTable {
    pub fn contains(&self, first: u32, second: u32) -> bool {
        self.pairs.iter().any(|p| p.first == first && p.second == second)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Persisted handle to an atlas texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    /// Store path of the texture image
    pub path: PathBuf,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub filter: FilterMode,
}

/// Atlas texture with its pixel data.
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub filter: FilterMode,
    pub image: RgbaImage,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Handle to this texture once stored at `path`.
    pub fn reference(&self, path: &Path) -> TextureRef {
        TextureRef {
            path: path.to_path_buf(),
            name: self.name.clone(),
            width: self.width(),
            height: self.height(),
            filter: self.filter,
        }
    }
}

/// Material referencing an atlas texture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: String,
    pub shader: String,
    /// Store path of the main texture
    #[serde(default)]
    pub main_texture: Option<PathBuf>,
    #[serde(default)]
    pub floats: BTreeMap<String, f32>,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: impl Into<String>) -> Self {
        Self { name: name.into(), shader: shader.into(), ..Default::default() }
    }

    pub fn set_float(&mut self, key: &str, value: f32) {
        self.floats.insert(key.to_string(), value);
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        self.floats.get(key).copied()
    }
}

/// A font asset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontAsset {
    pub name: String,
    #[serde(default)]
    pub asset_type: FontAssetType,
    pub face_info: FaceInfo,
    #[serde(default)]
    pub glyphs: Vec<Glyph>,
    #[serde(default)]
    pub kerning: KerningTable,
    #[serde(default)]
    pub atlas: Option<TextureRef>,
    pub material: Material,
    pub normal_style: f32,
    pub bold_style: f32,
}

impl FontAsset {
    pub const DEFAULT_NORMAL_STYLE: f32 = 0.0;
    pub const DEFAULT_BOLD_STYLE: f32 = 0.75;

    /// Empty distance-field asset named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_type: FontAssetType::Sdf,
            face_info: FaceInfo::default(),
            glyphs: Vec::new(),
            kerning: KerningTable::default(),
            atlas: None,
            material: Material::default(),
            normal_style: Self::DEFAULT_NORMAL_STYLE,
            bold_style: Self::DEFAULT_BOLD_STYLE,
        }
    }

    pub fn glyph(&self, id: u32) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.id == id)
    }
}

/// Asset store error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid asset document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write texture {path}: {source}")]
    Texture {
        path: PathBuf,
        #[source]
        source: OutputError,
    },
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Persistence for font assets, materials and textures.
///
/// Paths are store-relative.
pub trait AssetStore: Send {
    /// Load a font asset, `None` if nothing is stored at `path`.
    fn load_font_asset(&self, path: &Path) -> Result<Option<FontAsset>, StoreError>;

    fn save_font_asset(&mut self, path: &Path, asset: &FontAsset) -> Result<(), StoreError>;

    /// Paths of font assets whose name contains `filter`, sorted.
    fn find_font_assets(&self, filter: &str) -> Result<Vec<PathBuf>, StoreError>;

    /// Paths of standalone materials whose name contains `filter`, sorted.
    fn find_materials(&self, filter: &str) -> Result<Vec<PathBuf>, StoreError>;

    fn load_material(&self, path: &Path) -> Result<Option<Material>, StoreError>;

    fn save_material(&mut self, path: &Path, material: &Material) -> Result<(), StoreError>;

    /// Write a texture, replacing whatever was stored at `path`.
    fn save_texture(&mut self, path: &Path, texture: &Texture) -> Result<(), StoreError>;

    /// Delete a texture. Missing textures are not an error.
    fn remove_texture(&mut self, path: &Path) -> Result<(), StoreError>;

    /// Flush pending writes.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store shared between the owner thread and rebuild callbacks.
pub type SharedStore = Arc<Mutex<dyn AssetStore>>;

/// Asset name for a store path: the file stem.
pub fn asset_name(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}
