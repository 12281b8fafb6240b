//! Deterministic in-memory engine
//!
//! Returns scripted status codes, lays requested glyphs out on a fixed grid
//! and answers kerning queries from a canned table. Every call is recorded
//! so tests can assert the exact call sequence.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{
    EngineCode, EngineFaceInfo, EngineGlyph, EngineKerningPair, FontEngine, RenderRequest,
    RenderTarget,
};

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Initialize,
    LoadFont(PathBuf),
    SetSize(u32),
    Render(RenderRequest),
    KerningPairs { characters: Vec<u32>, max_pairs: usize },
    Shutdown,
}

#[derive(Debug)]
struct Script {
    init_code: EngineCode,
    load_code: EngineCode,
    size_code: EngineCode,
    face: EngineFaceInfo,
    cell: u32,
    fill: u8,
    missing: HashSet<u32>,
    kerning: Vec<EngineKerningPair>,
    progress: f32,
    render_panic: Option<String>,
    calls: Vec<EngineCall>,
}

/// Engine double driven entirely by its script.
#[derive(Debug)]
pub struct ScriptedEngine {
    script: Mutex<Script>,
}

impl ScriptedEngine {
    /// Engine that succeeds at every step with a small default face.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                init_code: EngineCode::OK,
                load_code: EngineCode::OK,
                size_code: EngineCode::OK,
                face: EngineFaceInfo {
                    name: "Scripted".to_string(),
                    point_size: 72,
                    line_height: 90.0,
                    ascender: 70.0,
                    descender: -18.0,
                    underline: -10.0,
                    underline_thickness: 0.0,
                    ..Default::default()
                },
                cell: 8,
                fill: 0xFF,
                missing: HashSet::new(),
                kerning: Vec::new(),
                progress: 0.0,
                render_panic: None,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_init_code(self, code: EngineCode) -> Self {
        self.lock().init_code = code;
        self
    }

    pub fn with_load_code(self, code: EngineCode) -> Self {
        self.lock().load_code = code;
        self
    }

    pub fn with_size_code(self, code: EngineCode) -> Self {
        self.lock().size_code = code;
        self
    }

    /// Face metrics reported by every render. Atlas size, padding and
    /// packed count are filled in from the request.
    pub fn with_face(self, face: EngineFaceInfo) -> Self {
        self.lock().face = face;
        self
    }

    /// Side length of the square cell each glyph occupies.
    pub fn with_cell_size(self, cell: u32) -> Self {
        self.lock().cell = cell.max(1);
        self
    }

    /// Byte written into the atlas for every packed glyph pixel.
    pub fn with_fill(self, fill: u8) -> Self {
        self.lock().fill = fill;
        self
    }

    /// Code points the "font" does not contain.
    pub fn with_missing(self, missing: impl IntoIterator<Item = char>) -> Self {
        self.lock().missing = missing.into_iter().map(u32::from).collect();
        self
    }

    /// Kerning table returned (unfiltered by duplicates) from queries.
    pub fn with_kerning(self, pairs: Vec<EngineKerningPair>) -> Self {
        self.lock().kerning = pairs;
        self
    }

    /// Make the next render panic with `message`. Later renders succeed.
    pub fn with_render_panic(self, message: impl Into<String>) -> Self {
        self.lock().render_panic = Some(message.into());
        self
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FontEngine for ScriptedEngine {
    fn initialize(&self) -> EngineCode {
        let mut script = self.lock();
        script.calls.push(EngineCall::Initialize);
        script.init_code
    }

    fn load_font(&self, path: &Path) -> EngineCode {
        let mut script = self.lock();
        script.calls.push(EngineCall::LoadFont(path.to_path_buf()));
        script.load_code
    }

    fn set_size(&self, point_size: u32) -> EngineCode {
        let mut script = self.lock();
        script.calls.push(EngineCall::SetSize(point_size));
        script.size_code
    }

    fn render_characters(&self, request: &RenderRequest, target: &mut RenderTarget) {
        let mut script = self.lock();
        script.calls.push(EngineCall::Render(request.clone()));
        script.progress = 0.0;
        if let Some(message) = script.render_panic.take() {
            drop(script);
            panic!("{}", message);
        }

        let cell = script.cell;
        let stride = cell.saturating_add(request.padding);
        let columns = (request.width / stride.max(1)).max(1);
        let mut packed = 0u32;

        for (i, &id) in request.characters.iter().enumerate() {
            let slot_x = (packed % columns).saturating_mul(stride);
            let slot_y = (packed / columns).saturating_mul(stride);
            let fits = slot_x.saturating_add(cell) <= request.width
                && slot_y.saturating_add(cell) <= request.height;

            if script.missing.contains(&id) || !fits {
                target.glyphs[i] = EngineGlyph::missing(id);
                continue;
            }

            for y in slot_y..slot_y + cell {
                let row = (y * request.width) as usize;
                for x in slot_x..slot_x + cell {
                    target.buffer[row + x as usize] = script.fill;
                }
            }

            target.glyphs[i] = EngineGlyph {
                id,
                x: slot_x as f32,
                y: slot_y as f32,
                width: cell as f32,
                height: cell as f32,
                x_offset: 0.0,
                y_offset: cell as f32,
                x_advance: cell as f32 + 1.0,
            };
            packed += 1;
        }

        target.face = EngineFaceInfo {
            padding: request.padding as i32,
            character_count: packed as i32,
            atlas_width: request.width as i32,
            atlas_height: request.height as i32,
            ..script.face.clone()
        };
        script.progress = 1.0;
    }

    fn render_progress(&self) -> f32 {
        self.lock().progress
    }

    fn kerning_pairs(
        &self,
        _font_path: &Path,
        characters: &[u32],
        max_pairs: usize,
    ) -> Vec<EngineKerningPair> {
        let mut script = self.lock();
        script
            .calls
            .push(EngineCall::KerningPairs { characters: characters.to_vec(), max_pairs });

        let wanted: HashSet<u32> = characters.iter().copied().collect();
        script
            .kerning
            .iter()
            .filter(|p| wanted.contains(&p.left) && wanted.contains(&p.right))
            .take(max_pairs)
            .copied()
            .collect()
    }

    fn shutdown(&self) {
        self.lock().calls.push(EngineCall::Shutdown);
    }
}
