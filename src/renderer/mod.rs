//! Blitter abstraction layer.
//!
//! *The compositor never touches a pixel buffer directly.* It streams sprite
//! draws, debug lines and text boxes to a type that implements [`Blitter`].
//!
//! * Sprite positions arrive in **virtual** pixels together with the
//!   [`DrawRegion`] they belong to; the blitter owns the zoom sampling and
//!   clips every write to `region.screen_rect()`.
//! * Lines, rectangles and text arrive in **screen** pixels with an explicit
//!   clip rectangle.

use crate::{
    engine::types::{DrawRegion, Rect},
    world::sprite::{SpriteBank, SpriteId},
};

/// Pixel format of the software frame-buffer (0xAARRGGBB).
pub type Rgba = u32;

/// How palette indices of a sprite are mapped before the palette lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaletteMode {
    #[default]
    Normal,
    /// Substitute through the bank's recolour table with this index.
    Recolour(u16),
    /// Blend through the transparency table; index 0 stays transparent.
    Transparent,
}

/// Part of a sprite to draw, in sprite pixels: `left..right` × `top..bottom`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubSprite {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Glyph cell of the built-in block font, `(width, height)` in screen pixels.
pub const GLYPH_NORMAL: (i32, i32) = (6, 10);
pub const GLYPH_SMALL: (i32, i32) = (4, 6);

/// Screen width of `text` in the built-in block font.
pub fn text_width(text: &str, small: bool) -> i32 {
    let (w, _) = if small { GLYPH_SMALL } else { GLYPH_NORMAL };
    text.chars().count() as i32 * w
}

pub fn font_height(small: bool) -> i32 {
    if small { GLYPH_SMALL.1 } else { GLYPH_NORMAL.1 }
}

/// Pixel sink driven by the compositor.
pub trait Blitter {
    /// Frame-buffer size in screen pixels.
    fn size(&self) -> (usize, usize);

    /// Draw `image` anchored at virtual `(x, y)` inside `region`.
    ///
    /// The sprite's own `x_offs/y_offs` are applied by the blitter.
    #[allow(clippy::too_many_arguments)]
    fn draw_sprite(
        &mut self,
        region: &DrawRegion,
        bank: &SpriteBank,
        image: SpriteId,
        mode: PaletteMode,
        x: i32,
        y: i32,
        sub: Option<SubSprite>,
    );

    /// Plot one screen pixel if it lies inside `clip`.
    fn set_pixel(&mut self, clip: &Rect, x: i32, y: i32, colour: Rgba);

    /// Bresenham line between two screen points, both ends included.
    fn draw_line(&mut self, clip: &Rect, x0: i32, y0: i32, x1: i32, y1: i32, colour: Rgba) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;
        loop {
            self.set_pixel(clip, x, y, colour);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Fill `rect ∩ clip`.
    fn fill_rect(&mut self, clip: &Rect, rect: Rect, colour: Rgba);

    /// Draw `text` left-aligned at screen `(x, y)` in the built-in font.
    #[allow(clippy::too_many_arguments)]
    fn draw_text(&mut self, clip: &Rect, x: i32, y: i32, text: &str, colour: Rgba, small: bool);

    /// Move the pixels of `rect` by `(dx, dy)`; the uncovered strip keeps
    /// stale content and must be repainted by the caller.
    fn scroll(&mut self, rect: Rect, dx: i32, dy: i32);
}

pub mod software;

pub use software::Software;
