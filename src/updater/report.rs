//! Glyph report built after each render

use std::fmt::Write as _;

use crate::engine::{EngineFaceInfo, EngineGlyph};

/// Longest report text kept before truncating the missing-character list.
pub const GLYPH_REPORT_LIMIT: usize = 16300;

/// Appended when the missing-character list did not fit.
pub const TRUNCATION_MARKER: &str = "\n\nReport truncated.";

/// Summary of which requested characters made it into the atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphReport {
    pub font_name: String,
    pub point_size: i32,
    pub requested: usize,
    pub packed: usize,
    /// Code points that rendered with the missing sentinel, in request order
    pub missing: Vec<u32>,
    /// Rendered text, capped at [`GLYPH_REPORT_LIMIT`] plus the marker
    pub text: String,
    pub truncated: bool,
}

impl GlyphReport {
    /// Build the report for one render.
    pub fn build(face: &EngineFaceInfo, glyphs: &[EngineGlyph], requested: usize) -> Self {
        let mut text = format!("Font: {}  Pt. Size: {}", face.name, face.point_size);
        let _ = write!(text, "\nCharacters packed: {}/{}", face.character_count, requested);
        text.push_str("\n\nMissing Characters");
        text.push_str("\n----------------------------------------");

        let missing: Vec<u32> =
            glyphs.iter().take(requested).filter(|g| g.is_missing()).map(|g| g.id).collect();

        let mut kept = text.clone();
        for &id in &missing {
            let _ = write!(text, "\nID: {}\tHex: {:X}\tChar [{}]", id, id, display_char(id));
            if text.len() < GLYPH_REPORT_LIMIT {
                kept.clone_from(&text);
            }
        }

        let truncated = text.len() > GLYPH_REPORT_LIMIT;
        if truncated {
            kept.push_str(TRUNCATION_MARKER);
        }

        Self {
            font_name: face.name.clone(),
            point_size: face.point_size,
            requested,
            packed: face.character_count.max(0) as usize,
            missing,
            text: kept,
            truncated,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

fn display_char(id: u32) -> char {
    char::from_u32(id).filter(|c| !c.is_control()).unwrap_or(char::REPLACEMENT_CHARACTER)
}
