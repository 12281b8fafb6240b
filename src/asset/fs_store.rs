//! Filesystem asset store
//!
//! Font assets are pretty-printed JSON files with the `.asset` extension,
//! standalone materials use `.mat`, textures are PNG files. All paths are
//! relative to the store root.

use std::fs;
use std::path::{Path, PathBuf};

use super::{asset_name, AssetStore, FontAsset, Material, StoreError, Texture};
use crate::output::{save_png, OutputError};

pub const FONT_ASSET_EXTENSION: &str = "asset";
pub const MATERIAL_EXTENSION: &str = "mat";

/// Asset store rooted at a project directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, StoreError> {
        let full = self.full_path(path);
        if !full.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&full).map_err(|source| StoreError::Io { path: full.clone(), source })?;
        let value =
            serde_json::from_str(&contents).map_err(|source| StoreError::Json { path: full, source })?;
        Ok(Some(value))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|source| StoreError::Json { path: full.clone(), source })?;
        fs::write(&full, json).map_err(|source| StoreError::Io { path: full, source })
    }

    /// Store-relative paths of files with `extension` whose stem contains `filter`.
    fn find(&self, extension: &str, filter: &str) -> Result<Vec<PathBuf>, StoreError> {
        let pattern = format!(
            "{}/**/*.{}",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            extension
        );

        let mut found: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(Result::ok)
            .filter(|path| asset_name(path).contains(filter))
            .filter_map(|path| path.strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .collect();
        found.sort();
        Ok(found)
    }
}

impl AssetStore for FsAssetStore {
    fn load_font_asset(&self, path: &Path) -> Result<Option<FontAsset>, StoreError> {
        self.read_json(path)
    }

    fn save_font_asset(&mut self, path: &Path, asset: &FontAsset) -> Result<(), StoreError> {
        self.write_json(path, asset)
    }

    fn find_font_assets(&self, filter: &str) -> Result<Vec<PathBuf>, StoreError> {
        self.find(FONT_ASSET_EXTENSION, filter)
    }

    fn find_materials(&self, filter: &str) -> Result<Vec<PathBuf>, StoreError> {
        self.find(MATERIAL_EXTENSION, filter)
    }

    fn load_material(&self, path: &Path) -> Result<Option<Material>, StoreError> {
        self.read_json(path)
    }

    fn save_material(&mut self, path: &Path, material: &Material) -> Result<(), StoreError> {
        self.write_json(path, material)
    }

    fn save_texture(&mut self, path: &Path, texture: &Texture) -> Result<(), StoreError> {
        let full = self.full_path(path);
        save_png(&texture.image, &full).map_err(|source| StoreError::Texture { path: full, source })
    }

    fn remove_texture(&mut self, path: &Path) -> Result<(), StoreError> {
        let full = self.full_path(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Texture { path: full, source: OutputError::Io(source) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::FilterMode;
    use image::RgbaImage;
    use tempfile::TempDir;

    #[test]
    fn test_font_asset_save_load() {
        let temp = TempDir::new().unwrap();
        let mut store = FsAssetStore::new(temp.path());
        let path = Path::new("Fonts/Roboto SDF.asset");

        assert!(store.load_font_asset(path).unwrap().is_none());

        let asset = FontAsset::new("Roboto SDF");
        store.save_font_asset(path, &asset).unwrap();
        assert!(temp.path().join(path).exists());
        assert_eq!(store.load_font_asset(path).unwrap(), Some(asset));
    }

    #[test]
    fn test_find_font_assets_relative_and_sorted() {
        let temp = TempDir::new().unwrap();
        let mut store = FsAssetStore::new(temp.path());
        store.save_font_asset(Path::new("b/Roboto SDF.asset"), &FontAsset::new("x")).unwrap();
        store.save_font_asset(Path::new("a/Roboto SDF.asset"), &FontAsset::new("x")).unwrap();
        store.save_font_asset(Path::new("a/Lato SDF.asset"), &FontAsset::new("x")).unwrap();

        let found = store.find_font_assets("Roboto SDF").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("a/Roboto SDF.asset"), PathBuf::from("b/Roboto SDF.asset")]
        );
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Broken.asset"), "{ not json").unwrap();
        let store = FsAssetStore::new(temp.path());

        let err = store.load_font_asset(Path::new("Broken.asset")).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn test_texture_save_and_remove() {
        let temp = TempDir::new().unwrap();
        let mut store = FsAssetStore::new(temp.path());
        let path = Path::new("Fonts/Roboto SDF Atlas.png");
        let texture = Texture {
            name: "Roboto SDF Atlas".to_string(),
            filter: FilterMode::Bilinear,
            image: RgbaImage::new(4, 4),
        };

        store.save_texture(path, &texture).unwrap();
        assert!(temp.path().join(path).exists());

        store.remove_texture(path).unwrap();
        assert!(!temp.path().join(path).exists());
        store.remove_texture(path).unwrap();
    }

    #[test]
    fn test_materials_use_their_own_extension() {
        let temp = TempDir::new().unwrap();
        let mut store = FsAssetStore::new(temp.path());
        store
            .save_material(Path::new("Roboto SDF_Glow.mat"), &Material::new("Roboto SDF_Glow", "s"))
            .unwrap();

        assert!(store.find_font_assets("Roboto").unwrap().is_empty());
        assert_eq!(store.find_materials("Roboto SDF_").unwrap().len(), 1);
    }
}
