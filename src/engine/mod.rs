//! Font engine contract
//!
//! Glyph rasterization, SDF generation and kerning extraction live behind
//! [`FontEngine`]. The contract mirrors a native plugin: calls return raw
//! status codes, rendering fills caller-owned buffers, and progress is
//! polled separately while a render is in flight.
//!
//! The engine is treated as a single global instance with no reentrancy
//! guarantee. [`EngineSlot`] makes that explicit: a rebuild must hold an
//! [`EngineLease`] for its whole initialize … shutdown round trip.

pub mod raster;
pub mod scripted;

pub use raster::FontdueEngine;
pub use scripted::ScriptedEngine;

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raw status code returned by engine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineCode(pub u32);

impl EngineCode {
    /// Generic success
    pub const OK: EngineCode = EngineCode(0);
    /// `initialize` called on an engine that is already up
    pub const ALREADY_INITIALIZED: EngineCode = EngineCode(0xF0);
    /// `load_font` called with the font that is already loaded
    pub const ALREADY_LOADED: EngineCode = EngineCode(0xF1);
    /// Call made before `initialize`
    pub const NOT_INITIALIZED: EngineCode = EngineCode(0x01);
    /// Font file could not be read or parsed
    pub const INVALID_FONT: EngineCode = EngineCode(0x02);
    /// `set_size` called before a font was loaded
    pub const NO_FONT: EngineCode = EngineCode(0x03);
    /// Requested point size is unusable
    pub const INVALID_SIZE: EngineCode = EngineCode(0x04);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl std::fmt::Display for EngineCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Face style applied while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FaceStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
    Outline,
    BoldSim,
}

/// Rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    SmoothHinted,
    Smooth,
    RasterHinted,
    Raster,
    #[default]
    #[serde(rename = "distance-field16")]
    DistanceField16,
    #[serde(rename = "distance-field32")]
    DistanceField32,
}

impl RenderMode {
    /// Modes that produce hard-edged coverage and want point filtering.
    pub fn is_raster(self) -> bool {
        matches!(self, RenderMode::Raster | RenderMode::RasterHinted)
    }

    /// Modes that produce a signed distance field.
    pub fn is_distance_field(self) -> bool {
        matches!(self, RenderMode::DistanceField16 | RenderMode::DistanceField32)
    }

    /// Scale a style modifier the way the engine expects for this mode.
    ///
    /// Distance-field modes render at 16x or 32x resolution, so the stroke
    /// size is scaled to match.
    pub fn effective_style_modifier(self, base: f32) -> f32 {
        match self {
            RenderMode::DistanceField16 => base * 16.0,
            RenderMode::DistanceField32 => base * 32.0,
            _ => base,
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RenderMode::SmoothHinted => "smooth-hinted",
            RenderMode::Smooth => "smooth",
            RenderMode::RasterHinted => "raster-hinted",
            RenderMode::Raster => "raster",
            RenderMode::DistanceField16 => "distance-field16",
            RenderMode::DistanceField32 => "distance-field32",
        };
        write!(f, "{}", name)
    }
}

/// Bin-packing strategy for arranging glyphs in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackingMethod {
    /// Speed-optimized
    #[default]
    Fast,
    /// Space-optimized
    Optimum,
}

impl PackingMethod {
    /// Numeric method id passed across the engine boundary.
    pub fn code(self) -> u32 {
        match self {
            PackingMethod::Fast => 0,
            PackingMethod::Optimum => 4,
        }
    }
}

/// Face-wide metrics produced by a render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineFaceInfo {
    pub name: String,
    pub point_size: i32,
    pub padding: i32,
    pub line_height: f32,
    pub baseline: f32,
    pub ascender: f32,
    pub descender: f32,
    pub center_line: f32,
    pub underline: f32,
    pub underline_thickness: f32,
    /// Number of glyphs successfully packed
    pub character_count: i32,
    pub atlas_width: i32,
    pub atlas_height: i32,
}

/// Per-glyph render result. Missing glyphs carry `x == -1`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineGlyph {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_advance: f32,
}

impl EngineGlyph {
    /// Position sentinel for a glyph the font could not provide.
    pub const MISSING: f32 = -1.0;

    /// Record for a requested code point that could not be packed.
    pub fn missing(id: u32) -> Self {
        Self { id, x: Self::MISSING, y: Self::MISSING, ..Default::default() }
    }

    pub fn is_missing(&self) -> bool {
        self.x == Self::MISSING
    }
}

/// Kerning adjustment, normalized per point of size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineKerningPair {
    pub left: u32,
    pub right: u32,
    pub x_advance_offset: f32,
}

/// Parameters for one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub characters: Vec<u32>,
    pub style: FaceStyle,
    pub style_modifier: f32,
    pub auto_size: bool,
    pub render_mode: RenderMode,
    pub packing: PackingMethod,
}

/// Caller-owned buffers the engine writes into.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    /// Single-channel atlas, `width * height` bytes, row-major from the top
    pub buffer: Vec<u8>,
    pub face: EngineFaceInfo,
    /// One record per requested character, in request order
    pub glyphs: Vec<EngineGlyph>,
}

impl RenderTarget {
    /// Allocate buffers sized for `request`.
    pub fn for_request(request: &RenderRequest) -> Self {
        Self {
            buffer: vec![0; request.width as usize * request.height as usize],
            face: EngineFaceInfo::default(),
            glyphs: vec![EngineGlyph::default(); request.characters.len()],
        }
    }
}

/// Request/response contract of the font engine.
pub trait FontEngine: Send + Sync {
    /// Bring the engine up. [`EngineCode::ALREADY_INITIALIZED`] is benign.
    fn initialize(&self) -> EngineCode;

    /// Load a font file. [`EngineCode::ALREADY_LOADED`] is benign.
    fn load_font(&self, path: &Path) -> EngineCode;

    /// Set the sampling point size.
    fn set_size(&self, point_size: u32) -> EngineCode;

    /// Rasterize and pack `request.characters` into `target`. Blocks until
    /// done; callers run it off the owner thread.
    fn render_characters(&self, request: &RenderRequest, target: &mut RenderTarget);

    /// Progress of the render in flight, in `[0, 1]`.
    fn render_progress(&self) -> f32;

    /// Kerning pairs among `characters`, at most `max_pairs` of them.
    fn kerning_pairs(
        &self,
        font_path: &Path,
        characters: &[u32],
        max_pairs: usize,
    ) -> Vec<EngineKerningPair>;

    /// Tear the engine down and release the loaded font.
    fn shutdown(&self);
}

/// Exclusive access point to the process-wide engine.
#[derive(Clone)]
pub struct EngineSlot {
    engine: Arc<dyn FontEngine>,
    leased: Arc<AtomicBool>,
}

impl std::fmt::Debug for EngineSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSlot").field("leased", &self.is_leased()).finish()
    }
}

impl EngineSlot {
    pub fn new(engine: Arc<dyn FontEngine>) -> Self {
        Self { engine, leased: Arc::new(AtomicBool::new(false)) }
    }

    /// Take the engine for one rebuild. `None` while someone else holds it.
    pub fn try_acquire(&self) -> Option<EngineLease> {
        if self.leased.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(EngineLease { engine: Arc::clone(&self.engine), leased: Arc::clone(&self.leased) })
    }

    pub fn is_leased(&self) -> bool {
        self.leased.load(Ordering::SeqCst)
    }

    /// Shared reference to the engine for read-only queries such as progress.
    pub fn engine(&self) -> Arc<dyn FontEngine> {
        Arc::clone(&self.engine)
    }
}

/// Exclusive hold on the engine. Released on drop.
pub struct EngineLease {
    engine: Arc<dyn FontEngine>,
    leased: Arc<AtomicBool>,
}

impl Deref for EngineLease {
    type Target = dyn FontEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.leased.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_modifier_scaling() {
        assert_eq!(RenderMode::DistanceField16.effective_style_modifier(2.0), 32.0);
        assert_eq!(RenderMode::DistanceField32.effective_style_modifier(2.0), 64.0);
        assert_eq!(RenderMode::Smooth.effective_style_modifier(2.0), 2.0);
        assert_eq!(RenderMode::Raster.effective_style_modifier(1.5), 1.5);
    }

    #[test]
    fn test_packing_codes() {
        assert_eq!(PackingMethod::Fast.code(), 0);
        assert_eq!(PackingMethod::Optimum.code(), 4);
    }

    #[test]
    fn test_missing_glyph_sentinel() {
        let glyph = EngineGlyph::missing(65);
        assert!(glyph.is_missing());
        assert_eq!(glyph.y, -1.0);
        assert!(!EngineGlyph { id: 65, ..Default::default() }.is_missing());
    }

    #[test]
    fn test_engine_code_display() {
        assert_eq!(EngineCode::ALREADY_LOADED.to_string(), "0xF1");
        assert!(EngineCode::OK.is_ok());
        assert!(!EngineCode::ALREADY_INITIALIZED.is_ok());
    }

    #[test]
    fn test_engine_slot_is_exclusive() {
        let slot = EngineSlot::new(Arc::new(ScriptedEngine::new()));
        let lease = slot.try_acquire().unwrap();
        assert!(slot.is_leased());
        assert!(slot.try_acquire().is_none());

        drop(lease);
        assert!(!slot.is_leased());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn test_render_mode_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: RenderMode,
        }
        let parsed: Wrapper = toml::from_str(r#"mode = "distance-field32""#).unwrap();
        assert_eq!(parsed.mode, RenderMode::DistanceField32);
        let parsed: Wrapper = toml::from_str(r#"mode = "raster-hinted""#).unwrap();
        assert_eq!(parsed.mode, RenderMode::RasterHinted);
    }
}
