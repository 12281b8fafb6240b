//! Atlas packing - places glyph bitmaps into a fixed-size single-channel atlas
//!
//! Implements shelf bin packing. The fast method packs in request order;
//! the optimum method sorts by height first, which wastes less space per
//! shelf.

use crate::engine::PackingMethod;

/// Configuration for atlas packing
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Atlas dimensions (width, height)
    pub size: (u32, u32),
    /// Padding between glyphs in pixels
    pub padding: u32,
    /// Packing strategy
    pub method: PackingMethod,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self { size: (1024, 1024), padding: 0, method: PackingMethod::Fast }
    }
}

/// A shelf in the shelf packing algorithm
#[derive(Debug)]
struct Shelf {
    y: u32,
    height: u32,
    width_used: u32,
}

/// Pack rectangles into the atlas.
///
/// Returns one entry per input, in input order: the top-left position, or
/// `None` when the rectangle did not fit.
pub fn pack_rects(sizes: &[(u32, u32)], config: &AtlasConfig) -> Vec<Option<(u32, u32)>> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    if config.method == PackingMethod::Optimum {
        // Stable sort keeps request order among equal heights
        order.sort_by(|&a, &b| sizes[b].1.cmp(&sizes[a].1));
    }

    let mut shelves: Vec<Shelf> = vec![];
    let mut placed = vec![None; sizes.len()];

    for idx in order {
        let (w, h) = sizes[idx];
        placed[idx] = try_place_in_shelves(
            &mut shelves,
            w.saturating_add(config.padding),
            h.saturating_add(config.padding),
            h,
            config.size,
        );
    }

    placed
}

/// Try to place a rectangle in the given shelves
fn try_place_in_shelves(
    shelves: &mut Vec<Shelf>,
    padded_w: u32,
    padded_h: u32,
    rect_h: u32,
    max_size: (u32, u32),
) -> Option<(u32, u32)> {
    // Try to fit in existing shelf
    for shelf in shelves.iter_mut() {
        if rect_h <= shelf.height && shelf.width_used.saturating_add(padded_w) <= max_size.0 {
            let x = shelf.width_used;
            let y = shelf.y;
            shelf.width_used += padded_w;
            return Some((x, y));
        }
    }

    // Try to create new shelf
    let new_shelf_y = shelves.last().map(|s| s.y + s.height).unwrap_or(0);
    if new_shelf_y.saturating_add(padded_h) <= max_size.1 && padded_w <= max_size.0 {
        shelves.push(Shelf { y: new_shelf_y, height: padded_h, width_used: padded_w });
        return Some((0, new_shelf_y));
    }

    None
}

/// Copy a single-channel bitmap into the atlas buffer at the given position.
///
/// Pixels falling outside the atlas are clipped.
pub fn blit(
    atlas: &mut [u8],
    atlas_size: (u32, u32),
    bitmap: &[u8],
    bitmap_size: (u32, u32),
    x: u32,
    y: u32,
) {
    let (aw, ah) = atlas_size;
    let (bw, bh) = bitmap_size;
    for by in 0..bh {
        if y + by >= ah {
            break;
        }
        for bx in 0..bw {
            if x + bx >= aw {
                break;
            }
            atlas[((y + by) * aw + x + bx) as usize] = bitmap[(by * bw + bx) as usize];
        }
    }
}
