//! Reference engine built on fontdue
//!
//! Rasterizes glyphs with fontdue, shelf-packs them into the caller's
//! atlas buffer and, for the distance-field modes, converts each padded
//! glyph into a brute-force signed distance field whose spread equals the
//! padding. Hinting is not available, so hinted modes render like their
//! unhinted counterparts. Italic and outline styles are not synthesized.

use fontdue::{Font, FontSettings, Metrics};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{
    EngineCode, EngineFaceInfo, EngineGlyph, EngineKerningPair, FaceStyle, FontEngine,
    RenderMode, RenderRequest, RenderTarget,
};
use crate::atlas::{blit, pack_rects, AtlasConfig};

/// Smallest size tried when auto-sizing.
const MIN_AUTO_SIZE: u32 = 4;
/// Largest size tried when auto-sizing.
const MAX_AUTO_SIZE: u32 = 512;

struct LoadedFont {
    path: PathBuf,
    name: String,
    font: Font,
}

#[derive(Default)]
struct EngineState {
    initialized: bool,
    font: Option<LoadedFont>,
    point_size: u32,
}

/// Font engine backed by fontdue.
pub struct FontdueEngine {
    state: Mutex<EngineState>,
    /// f32 progress stored as raw bits so it can be polled without the lock
    progress: AtomicU32,
}

impl std::fmt::Debug for FontdueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontdueEngine").field("progress", &self.render_progress()).finish()
    }
}

impl FontdueEngine {
    pub fn new() -> Self {
        Self { state: Mutex::new(EngineState::default()), progress: AtomicU32::new(0) }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_progress(&self, value: f32) {
        self.progress.store(value.clamp(0.0, 1.0).to_bits(), Ordering::SeqCst);
    }
}

impl Default for FontdueEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn read_font(path: &Path) -> Option<LoadedFont> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read font file");
            return None;
        }
    };
    match Font::from_bytes(data, FontSettings::default()) {
        Ok(font) => Some(LoadedFont {
            path: path.to_path_buf(),
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "font".to_string()),
            font,
        }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse font file");
            None
        }
    }
}

/// Padded cell size for a glyph. Saturates instead of overflowing.
fn cell_size(metrics: &Metrics, padding: u32) -> (u32, u32) {
    let border = padding.saturating_mul(2);
    (
        (metrics.width as u32).saturating_add(border),
        (metrics.height as u32).saturating_add(border),
    )
}

/// Whether a padded cell can be placed in the atlas at all.
fn cell_fits(cell: (u32, u32), request: &RenderRequest) -> bool {
    cell.0 <= request.width && cell.1 <= request.height
}

/// Largest size at which every available glyph fits the atlas.
fn auto_size(font: &Font, chars: &[Option<char>], request: &RenderRequest) -> u32 {
    let config = AtlasConfig {
        size: (request.width, request.height),
        padding: 0,
        method: request.packing,
    };
    let fits = |px: u32| {
        let sizes: Vec<(u32, u32)> = chars
            .iter()
            .flatten()
            .map(|&c| cell_size(&font.metrics(c, px as f32), request.padding))
            .collect();
        pack_rects(&sizes, &config).iter().all(Option::is_some)
    };

    let (mut lo, mut hi) = (MIN_AUTO_SIZE, MAX_AUTO_SIZE);
    if !fits(lo) {
        return lo;
    }
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Grow coverage by `radius` pixels.
fn dilate(bitmap: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    let mut out = vec![0u8; bitmap.len()];
    for y in 0..height {
        for x in 0..width {
            let mut best = 0u8;
            for ny in y.saturating_sub(radius)..(y + radius + 1).min(height) {
                for nx in x.saturating_sub(radius)..(x + radius + 1).min(width) {
                    best = best.max(bitmap[ny * width + nx]);
                }
            }
            out[y * width + x] = best;
        }
    }
    out
}

/// Place `bitmap` in the middle of a canvas padded by `padding` on each side.
fn pad(bitmap: &[u8], width: usize, height: usize, padding: usize) -> Vec<u8> {
    let canvas_w = width + padding * 2;
    let canvas_h = height + padding * 2;
    let mut canvas = vec![0u8; canvas_w * canvas_h];
    for y in 0..height {
        let src = &bitmap[y * width..(y + 1) * width];
        let start = (y + padding) * canvas_w + padding;
        canvas[start..start + width].copy_from_slice(src);
    }
    canvas
}

/// Brute-force signed distance field over a padded coverage canvas.
///
/// 0.5 sits on the outline; values rise inside and fall outside, reaching
/// the extremes at `spread` pixels.
fn distance_field(canvas: &[u8], width: usize, height: usize, spread: usize) -> Vec<u8> {
    let spread = spread.max(1);
    let inside = |x: usize, y: usize| canvas[y * width + x] >= 128;
    let mut out = vec![0u8; canvas.len()];

    for y in 0..height {
        for x in 0..width {
            let here = inside(x, y);
            let mut nearest = spread as f32;
            for ny in y.saturating_sub(spread)..(y + spread + 1).min(height) {
                for nx in x.saturating_sub(spread)..(x + spread + 1).min(width) {
                    if inside(nx, ny) != here {
                        let dx = nx as f32 - x as f32;
                        let dy = ny as f32 - y as f32;
                        nearest = nearest.min((dx * dx + dy * dy).sqrt());
                    }
                }
            }
            let signed = if here { nearest } else { -nearest };
            let value = 0.5 + signed / (2.0 * spread as f32);
            out[y * width + x] = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
    out
}

fn bold_radius(request: &RenderRequest) -> Option<usize> {
    if !matches!(request.style, FaceStyle::Bold | FaceStyle::BoldItalic | FaceStyle::BoldSim) {
        return None;
    }
    let unscaled = match request.render_mode {
        RenderMode::DistanceField16 => request.style_modifier / 16.0,
        RenderMode::DistanceField32 => request.style_modifier / 32.0,
        _ => request.style_modifier,
    };
    Some((unscaled.round() as usize).max(1))
}

impl FontEngine for FontdueEngine {
    fn initialize(&self) -> EngineCode {
        let mut state = self.lock();
        if state.initialized {
            return EngineCode::ALREADY_INITIALIZED;
        }
        state.initialized = true;
        EngineCode::OK
    }

    fn load_font(&self, path: &Path) -> EngineCode {
        let mut state = self.lock();
        if !state.initialized {
            return EngineCode::NOT_INITIALIZED;
        }
        if state.font.as_ref().is_some_and(|f| f.path == path) {
            return EngineCode::ALREADY_LOADED;
        }
        match read_font(path) {
            Some(font) => {
                state.font = Some(font);
                EngineCode::OK
            }
            None => EngineCode::INVALID_FONT,
        }
    }

    fn set_size(&self, point_size: u32) -> EngineCode {
        let mut state = self.lock();
        if state.font.is_none() {
            return EngineCode::NO_FONT;
        }
        if point_size == 0 {
            return EngineCode::INVALID_SIZE;
        }
        state.point_size = point_size;
        EngineCode::OK
    }

    fn render_characters(&self, request: &RenderRequest, target: &mut RenderTarget) {
        self.set_progress(0.0);
        let state = self.lock();
        let Some(loaded) = state.font.as_ref() else {
            warn!("render requested with no font loaded");
            target.glyphs = request.characters.iter().map(|&id| EngineGlyph::missing(id)).collect();
            self.set_progress(1.0);
            return;
        };
        let font = &loaded.font;

        let chars: Vec<Option<char>> = request
            .characters
            .iter()
            .map(|&id| char::from_u32(id).filter(|&c| font.lookup_glyph_index(c) != 0))
            .collect();

        let size = if request.auto_size {
            auto_size(font, &chars, request)
        } else {
            state.point_size
        };
        let px = size as f32;
        debug!(size, glyphs = chars.len(), mode = %request.render_mode, "rendering glyphs");

        if matches!(request.style, FaceStyle::Italic | FaceStyle::Outline) {
            debug!(style = ?request.style, "style not synthesized, rendering normal");
        }
        let bold = bold_radius(request);
        let padding = request.padding as usize;

        // Rasterize every available glyph into its padded cell
        let mut cells: Vec<Option<(Metrics, Vec<u8>, u32, u32)>> = Vec::with_capacity(chars.len());
        let total = chars.len().max(1) as f32;
        for (i, c) in chars.iter().enumerate() {
            let cell = c.and_then(|c| {
                let (metrics, mut bitmap) = font.rasterize(c, px);
                let (cw, ch) = cell_size(&metrics, request.padding);
                if !cell_fits((cw, ch), request) {
                    debug!(glyph = %c, cw, ch, "padded glyph larger than the atlas");
                    return None;
                }
                if let Some(radius) = bold {
                    bitmap = dilate(&bitmap, metrics.width, metrics.height, radius);
                }
                let canvas = pad(&bitmap, metrics.width, metrics.height, padding);
                let canvas = if request.render_mode.is_distance_field() {
                    distance_field(&canvas, cw as usize, ch as usize, padding)
                } else {
                    canvas
                };
                Some((metrics, canvas, cw, ch))
            });
            cells.push(cell);
            self.set_progress(0.9 * (i + 1) as f32 / total);
        }

        let sizes: Vec<(u32, u32)> =
            cells.iter().map(|c| c.as_ref().map(|(_, _, w, h)| (*w, *h)).unwrap_or((0, 0))).collect();
        let config = AtlasConfig {
            size: (request.width, request.height),
            padding: 0,
            method: request.packing,
        };
        let placed = pack_rects(&sizes, &config);

        let mut packed = 0;
        for (i, (cell, position)) in cells.iter().zip(placed).enumerate() {
            let id = request.characters[i];
            let (Some((metrics, canvas, cw, ch)), Some((x, y))) = (cell, position) else {
                target.glyphs[i] = EngineGlyph::missing(id);
                continue;
            };

            blit(&mut target.buffer, (request.width, request.height), canvas, (*cw, *ch), x, y);
            target.glyphs[i] = EngineGlyph {
                id,
                x: (x + request.padding) as f32,
                y: (y + request.padding) as f32,
                width: metrics.width as f32,
                height: metrics.height as f32,
                x_offset: metrics.xmin as f32,
                y_offset: (metrics.ymin + metrics.height as i32) as f32,
                x_advance: metrics.advance_width,
            };
            packed += 1;
        }

        let line = font.horizontal_line_metrics(px);
        let ascender = line.as_ref().map(|l| l.ascent).unwrap_or(px);
        let descender = line.as_ref().map(|l| l.descent).unwrap_or(0.0);
        target.face = EngineFaceInfo {
            name: loaded.name.clone(),
            point_size: size as i32,
            padding: request.padding as i32,
            line_height: line.as_ref().map(|l| l.new_line_size).unwrap_or(px),
            baseline: 0.0,
            ascender,
            descender,
            center_line: 0.0,
            underline: descender * 0.5,
            underline_thickness: 0.0,
            character_count: packed,
            atlas_width: request.width as i32,
            atlas_height: request.height as i32,
        };
        self.set_progress(1.0);
    }

    fn render_progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::SeqCst))
    }

    fn kerning_pairs(
        &self,
        font_path: &Path,
        characters: &[u32],
        max_pairs: usize,
    ) -> Vec<EngineKerningPair> {
        let state = self.lock();
        let reloaded;
        let (font, px) = match state.font.as_ref() {
            Some(loaded) if loaded.path == font_path => (&loaded.font, state.point_size.max(1)),
            _ => match read_font(font_path) {
                Some(loaded) => {
                    reloaded = loaded;
                    (&reloaded.font, state.point_size.max(1))
                }
                None => return Vec::new(),
            },
        };
        let px = px as f32;

        let chars: Vec<(u32, char)> =
            characters.iter().filter_map(|&id| char::from_u32(id).map(|c| (id, c))).collect();
        let mut pairs = Vec::new();
        for &(left_id, left) in &chars {
            for &(right_id, right) in &chars {
                if pairs.len() >= max_pairs {
                    return pairs;
                }
                if let Some(kern) = font.horizontal_kern(left, right, px) {
                    if kern != 0.0 {
                        pairs.push(EngineKerningPair {
                            left: left_id,
                            right: right_id,
                            x_advance_offset: kern / px,
                        });
                    }
                }
            }
        }
        pairs
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        *state = EngineState::default();
        self.set_progress(0.0);
    }
}
