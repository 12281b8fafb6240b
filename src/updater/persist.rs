//! Writing rebuilt atlases and metrics into font assets

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::asset::{
    asset_name, props, AssetStore, FaceInfo, FontAsset, FontAssetType, Glyph, KerningTable,
    Material, StoreError, Texture, TextureRef, DISTANCE_FIELD_SHADER,
};
use crate::config::FontConfig;
use crate::output::atlas_texture_path;

/// Everything a render produced that gets written into each target asset.
#[derive(Debug, Clone)]
pub struct AtlasUpdate {
    pub face: FaceInfo,
    pub glyphs: Vec<Glyph>,
    /// Replaces the asset's table when present; otherwise the old table stays
    pub kerning: Option<KerningTable>,
    pub texture: Texture,
    pub padding: u32,
}

/// What happened to one target asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub path: PathBuf,
    pub created: bool,
    /// Standalone materials that were repointed at the new atlas
    pub materials_updated: Vec<PathBuf>,
}

/// Target asset paths for a configuration.
///
/// The configured asset comes first, followed by every stored font asset
/// whose name contains "<font stem> SDF". Duplicates are dropped.
pub fn resolve_targets(
    store: &dyn AssetStore,
    config: &FontConfig,
) -> Result<Vec<PathBuf>, StoreError> {
    let mut targets = vec![config.font_asset.clone()];

    let stem = asset_name(&config.source_font);
    if !stem.is_empty() {
        for path in store.find_font_assets(&format!("{} SDF", stem))? {
            if !targets.contains(&path) {
                targets.push(path);
            }
        }
    }

    Ok(targets)
}

/// Standalone materials named "<asset name>_…" that sample the asset's
/// current atlas. Must run before the atlas is replaced.
pub fn find_material_references(
    store: &dyn AssetStore,
    asset: &FontAsset,
) -> Result<Vec<(PathBuf, Material)>, StoreError> {
    let Some(main_texture) = asset.material.main_texture.as_ref() else {
        return Ok(Vec::new());
    };

    let mut references: Vec<(PathBuf, Material)> = Vec::new();
    for path in store.find_materials(&format!("{}_", asset.name))? {
        let Some(material) = store.load_material(&path)? else {
            continue;
        };
        if material.main_texture.as_ref() == Some(main_texture)
            && !references.iter().any(|(p, _)| p == &path)
        {
            references.push((path, material));
        }
    }
    Ok(references)
}

/// Point a material at the atlas and set the distance-field parameters.
pub fn apply_material_properties(
    material: &mut Material,
    atlas: &TextureRef,
    padding: u32,
    normal_style: f32,
    bold_style: f32,
) {
    material.main_texture = Some(atlas.path.clone());
    material.set_float(props::TEXTURE_WIDTH, atlas.width as f32);
    material.set_float(props::TEXTURE_HEIGHT, atlas.height as f32);
    material.set_float(props::GRADIENT_SCALE, padding.saturating_add(1) as f32);
    material.set_float(props::WEIGHT_NORMAL, normal_style);
    material.set_float(props::WEIGHT_BOLD, bold_style);
}

/// Create or update the font asset at `path`.
pub fn save_font_asset(
    store: &mut dyn AssetStore,
    path: &Path,
    update: &AtlasUpdate,
) -> Result<SaveOutcome, StoreError> {
    let stem = asset_name(path);
    let atlas_path = atlas_texture_path(path);
    let mut texture = update.texture.clone();
    texture.name = format!("{} Atlas", stem);

    let outcome = match store.load_font_asset(path)? {
        None => {
            let mut asset = FontAsset::new(stem.as_str());
            write_metrics(&mut asset, update);

            store.save_texture(&atlas_path, &texture)?;
            let atlas = texture.reference(&atlas_path);

            let mut material = Material::new(format!("{} Material", stem), DISTANCE_FIELD_SHADER);
            apply_material_properties(
                &mut material,
                &atlas,
                update.padding,
                asset.normal_style,
                asset.bold_style,
            );
            asset.material = material;
            asset.atlas = Some(atlas);

            store.save_font_asset(path, &asset)?;
            debug!(path = %path.display(), "created font asset");
            SaveOutcome { path: path.to_path_buf(), created: true, materials_updated: Vec::new() }
        }
        Some(mut asset) => {
            let references = find_material_references(store, &asset)?;

            if let Some(old) = asset.atlas.take() {
                store.remove_texture(&old.path)?;
            }

            write_metrics(&mut asset, update);

            store.save_texture(&atlas_path, &texture)?;
            let atlas = texture.reference(&atlas_path);

            let (normal, bold) = (asset.normal_style, asset.bold_style);
            apply_material_properties(&mut asset.material, &atlas, update.padding, normal, bold);

            let mut materials_updated = Vec::with_capacity(references.len());
            for (material_path, mut material) in references {
                apply_material_properties(&mut material, &atlas, update.padding, normal, bold);
                store.save_material(&material_path, &material)?;
                materials_updated.push(material_path);
            }

            asset.atlas = Some(atlas);
            store.save_font_asset(path, &asset)?;
            debug!(
                path = %path.display(),
                materials = materials_updated.len(),
                "updated font asset"
            );
            SaveOutcome { path: path.to_path_buf(), created: false, materials_updated }
        }
    };

    store.flush()?;
    Ok(outcome)
}

fn write_metrics(asset: &mut FontAsset, update: &AtlasUpdate) {
    asset.asset_type = FontAssetType::Sdf;
    asset.face_info = update.face.clone();
    asset.glyphs = update.glyphs.clone();
    if let Some(kerning) = &update.kerning {
        asset.kerning = kerning.clone();
    }
}
