//! Translation of raw engine results into persisted asset records

use std::collections::HashSet;

use crate::asset::{FaceInfo, FilterMode, Glyph, KerningPair, KerningTable, Texture};
use crate::engine::{EngineFaceInfo, EngineGlyph, EngineKerningPair, RenderMode};
use crate::output::{alpha_to_rgba, OutputError};

/// Divisor applied to engine coordinates. The engine renders at final size.
pub const SCALE_DOWN: f32 = 1.0;

/// Underline thickness used when the font reports none.
pub const DEFAULT_UNDERLINE_THICKNESS: f32 = 5.0;

/// Unique code points of `text`, in first-seen order.
pub fn unique_characters(text: &str) -> Vec<u32> {
    let mut seen = HashSet::new();
    text.chars().map(u32::from).filter(|c| seen.insert(*c)).collect()
}

/// Face metrics with the derived typographic fields filled in.
pub fn convert_face_info(raw: &EngineFaceInfo, scale: f32) -> FaceInfo {
    let ascender = raw.ascender / scale;
    let descender = raw.descender / scale;
    let underline = raw.underline / scale;
    let underline_thickness = if raw.underline_thickness == 0.0 {
        DEFAULT_UNDERLINE_THICKNESS
    } else {
        raw.underline_thickness / scale
    };

    FaceInfo {
        name: raw.name.clone(),
        point_size: raw.point_size as f32 / scale,
        scale: 1.0,
        padding: raw.padding as f32 / scale,
        line_height: raw.line_height / scale,
        baseline: 0.0,
        ascender,
        descender,
        cap_height: 0.0,
        center_line: raw.center_line / scale,
        underline,
        underline_thickness,
        strikethrough: (ascender + descender) / 2.75,
        strikethrough_thickness: underline_thickness,
        superscript_offset: ascender,
        subscript_offset: underline,
        sub_size: 0.5,
        character_count: raw.character_count.max(0) as u32,
        atlas_width: raw.atlas_width as f32 / scale,
        atlas_height: raw.atlas_height as f32 / scale,
    }
}

/// Glyph table and kerning set for a render.
///
/// Records carrying the missing sentinel are dropped from both.
pub fn convert_glyphs(raw: &[EngineGlyph], scale: f32) -> (Vec<Glyph>, Vec<u32>) {
    let glyphs: Vec<Glyph> = raw
        .iter()
        .filter(|g| !g.is_missing())
        .map(|g| Glyph {
            id: g.id,
            x: g.x / scale,
            y: g.y / scale,
            width: g.width / scale,
            height: g.height / scale,
            x_offset: g.x_offset / scale,
            y_offset: g.y_offset / scale,
            x_advance: g.x_advance / scale,
            scale: 1.0,
        })
        .collect();
    let kerning_set = glyphs.iter().map(|g| g.id).collect();
    (glyphs, kerning_set)
}

/// Kerning table built from engine pairs.
pub struct BuiltKerning {
    pub table: KerningTable,
    /// `(first, second)` of each pair dropped as a duplicate
    pub duplicates: Vec<(u32, u32)>,
}

/// Scale pair offsets by `point_size` and drop repeated `(first, second)`
/// keys, keeping the first occurrence.
pub fn build_kerning_table(pairs: &[EngineKerningPair], point_size: f32) -> BuiltKerning {
    let mut seen = HashSet::new();
    let mut table = KerningTable::default();
    let mut duplicates = Vec::new();

    for pair in pairs {
        if seen.insert((pair.left, pair.right)) {
            table.pairs.push(KerningPair {
                first: pair.left,
                second: pair.right,
                x_offset: pair.x_advance_offset * point_size,
            });
        } else {
            duplicates.push((pair.left, pair.right));
        }
    }

    BuiltKerning { table, duplicates }
}

/// Texture filter for a render mode.
pub fn filter_for(mode: RenderMode) -> FilterMode {
    if mode.is_raster() {
        FilterMode::Point
    } else {
        FilterMode::Bilinear
    }
}

/// RGBA atlas texture from the engine's single-channel buffer.
pub fn atlas_texture(
    name: &str,
    buffer: &[u8],
    width: u32,
    height: u32,
    mode: RenderMode,
) -> Result<Texture, OutputError> {
    Ok(Texture {
        name: name.to_string(),
        filter: filter_for(mode),
        image: alpha_to_rgba(buffer, width, height)?,
    })
}
