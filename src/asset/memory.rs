//! In-memory asset store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{asset_name, AssetStore, FontAsset, Material, StoreError, Texture};

/// Store that keeps everything in maps. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    font_assets: BTreeMap<PathBuf, FontAsset>,
    materials: BTreeMap<PathBuf, Material>,
    textures: BTreeMap<PathBuf, Texture>,
    flushes: usize,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_font_asset(&mut self, path: impl Into<PathBuf>, asset: FontAsset) {
        self.font_assets.insert(path.into(), asset);
    }

    pub fn insert_material(&mut self, path: impl Into<PathBuf>, material: Material) {
        self.materials.insert(path.into(), material);
    }

    pub fn font_asset(&self, path: &Path) -> Option<&FontAsset> {
        self.font_assets.get(path)
    }

    pub fn material(&self, path: &Path) -> Option<&Material> {
        self.materials.get(path)
    }

    pub fn texture(&self, path: &Path) -> Option<&Texture> {
        self.textures.get(path)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of times [`AssetStore::flush`] was called.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

fn matching<V>(map: &BTreeMap<PathBuf, V>, filter: &str) -> Vec<PathBuf> {
    map.keys().filter(|path| asset_name(path).contains(filter)).cloned().collect()
}

impl AssetStore for MemoryAssetStore {
    fn load_font_asset(&self, path: &Path) -> Result<Option<FontAsset>, StoreError> {
        Ok(self.font_assets.get(path).cloned())
    }

    fn save_font_asset(&mut self, path: &Path, asset: &FontAsset) -> Result<(), StoreError> {
        self.font_assets.insert(path.to_path_buf(), asset.clone());
        Ok(())
    }

    fn find_font_assets(&self, filter: &str) -> Result<Vec<PathBuf>, StoreError> {
        Ok(matching(&self.font_assets, filter))
    }

    fn find_materials(&self, filter: &str) -> Result<Vec<PathBuf>, StoreError> {
        Ok(matching(&self.materials, filter))
    }

    fn load_material(&self, path: &Path) -> Result<Option<Material>, StoreError> {
        Ok(self.materials.get(path).cloned())
    }

    fn save_material(&mut self, path: &Path, material: &Material) -> Result<(), StoreError> {
        self.materials.insert(path.to_path_buf(), material.clone());
        Ok(())
    }

    fn save_texture(&mut self, path: &Path, texture: &Texture) -> Result<(), StoreError> {
        self.textures.insert(path.to_path_buf(), texture.clone());
        Ok(())
    }

    fn remove_texture(&mut self, path: &Path) -> Result<(), StoreError> {
        self.textures.remove(path);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_font_assets_by_name() {
        let mut store = MemoryAssetStore::new();
        store.insert_font_asset("Fonts/Roboto SDF.asset", FontAsset::new("Roboto SDF"));
        store.insert_font_asset("Fonts/Roboto Bold SDF.asset", FontAsset::new("Roboto Bold SDF"));
        store.insert_font_asset("Fonts/Lato SDF.asset", FontAsset::new("Lato SDF"));

        let found = store.find_font_assets("Roboto SDF").unwrap();
        assert_eq!(found, vec![PathBuf::from("Fonts/Roboto SDF.asset")]);
        assert_eq!(store.find_font_assets("SDF").unwrap().len(), 3);
    }

    #[test]
    fn test_material_roundtrip() {
        let mut store = MemoryAssetStore::new();
        let path = Path::new("Fonts/Roboto SDF_Outline.mat");
        assert!(store.load_material(path).unwrap().is_none());

        store.save_material(path, &Material::new("Roboto SDF_Outline", "shader")).unwrap();
        assert_eq!(store.load_material(path).unwrap().unwrap().name, "Roboto SDF_Outline");
        assert_eq!(store.find_materials("Roboto SDF_").unwrap(), vec![path.to_path_buf()]);
    }
}
