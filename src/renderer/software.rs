//! ---------------------------------------------------------------------------
//! Software (CPU) sprite blitter
//!
//! * Fills a `Vec<u32>` frame-buffer in **0xAARRGGBB** format.
//! * Relies on the compositor to feed sprites in painter's order, so no depth
//!   buffer is needed.
//! * The buffer persists between frames: only dirty rectangles are redrawn.
//! ---------------------------------------------------------------------------

use crate::{
    engine::{
        types::{DrawRegion, Rect},
        zoom::unscale_by_zoom_ceil,
    },
    renderer::{Blitter, GLYPH_NORMAL, GLYPH_SMALL, PaletteMode, Rgba, SubSprite},
    world::sprite::{PALETTE_TO_TRANSPARENT, SPR_EMPTY_BOUNDING_BOX, SpriteBank, SpriteId},
};

/*───────────────────────────────────────────────────────────────────────*/
/*                              Backend                                 */
/*───────────────────────────────────────────────────────────────────────*/

#[derive(Default)]
pub struct Software {
    scratch: Vec<Rgba>,
    width: usize,
    height: usize,
}

impl Software {
    pub fn new(width: usize, height: usize) -> Self {
        let mut sw = Self::default();
        sw.resize(width, height);
        sw
    }

    /// (Re)allocate for the requested resolution; content is cleared.
    pub fn resize(&mut self, w: usize, h: usize) {
        self.width = w;
        self.height = h;
        self.scratch.clear();
        self.scratch.resize(w * h, 0xFF_20_20_20);
    }

    pub fn clear(&mut self, colour: Rgba) {
        self.scratch.fill(colour);
    }

    /// Finished pixels, row-major.
    pub fn frame(&self) -> &[Rgba] {
        &self.scratch
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.scratch[y * self.width + x]
    }

    /// **Loan** the buffer to `submit(&[Rgba], w, h)`, e.g. a window update.
    pub fn present<F, R>(&self, submit: F) -> R
    where
        F: FnOnce(&[Rgba], usize, usize) -> R,
    {
        submit(&self.scratch, self.width, self.height)
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    #[inline]
    fn put(&mut self, x: i32, y: i32, colour: Rgba) {
        self.scratch[y as usize * self.width + x as usize] = colour;
    }
}

/// 50 % blend towards `src`.
#[inline]
fn blend_half(dst: Rgba, src: Rgba) -> Rgba {
    0xFF00_0000 | (((dst & 0x00FE_FEFE) >> 1) + ((src & 0x00FE_FEFE) >> 1))
}

/*──────────────────────── Blitter trait impl ─────────────────────────*/
impl Blitter for Software {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn draw_sprite(
        &mut self,
        region: &DrawRegion,
        bank: &SpriteBank,
        image: SpriteId,
        mode: PaletteMode,
        x: i32,
        y: i32,
        sub: Option<SubSprite>,
    ) {
        if image == SPR_EMPTY_BOUNDING_BOX {
            return;
        }
        let Some(clip) = region.screen_rect().intersection(&self.bounds()) else {
            return;
        };
        let spr = bank.sprite_or_missing(image);
        let (w, h) = (spr.width as i32, spr.height as i32);

        /* visible part of the sprite in sprite pixels */
        let (sl, st, sr, sb) = match sub {
            Some(s) => (s.left.max(0), s.top.max(0), s.right.min(w), s.bottom.min(h)),
            None => (0, 0, w, h),
        };
        if sl >= sr || st >= sb {
            return;
        }

        let ox = x + spr.x_offs as i32;
        let oy = y + spr.y_offs as i32;
        let shift = region.zoom.shift();

        /* a screen pixel samples the sprite at its top-left virtual corner */
        let x0 = (unscale_by_zoom_ceil(ox + sl - region.left, region.zoom) + region.screen_x).max(clip.left);
        let x1 = (unscale_by_zoom_ceil(ox + sr - region.left, region.zoom) + region.screen_x).min(clip.right);
        let y0 = (unscale_by_zoom_ceil(oy + st - region.top, region.zoom) + region.screen_y).max(clip.top);
        let y1 = (unscale_by_zoom_ceil(oy + sb - region.top, region.zoom) + region.screen_y).min(clip.bottom);

        let palette = bank.palette();
        let table = match mode {
            PaletteMode::Normal => None,
            PaletteMode::Recolour(t) => bank.recolour(t).ok(),
            PaletteMode::Transparent => bank.recolour(PALETTE_TO_TRANSPARENT).ok(),
        };

        for sy in y0..y1 {
            let vy = region.top + ((sy - region.screen_y) << shift);
            let row = (vy - oy) as usize;
            for sx in x0..x1 {
                let vx = region.left + ((sx - region.screen_x) << shift);
                let idx = spr.pixel((vx - ox) as usize, row);
                if idx == 0 {
                    continue;
                }
                let idx = table.map_or(idx, |t| t[idx]);
                let colour = palette[idx];
                if mode == PaletteMode::Transparent {
                    let dst = self.scratch[sy as usize * self.width + sx as usize];
                    self.put(sx, sy, blend_half(dst, colour));
                } else {
                    self.put(sx, sy, colour);
                }
            }
        }
    }

    fn set_pixel(&mut self, clip: &Rect, x: i32, y: i32, colour: Rgba) {
        if clip.contains(x, y) && self.bounds().contains(x, y) {
            self.put(x, y, colour);
        }
    }

    fn fill_rect(&mut self, clip: &Rect, rect: Rect, colour: Rgba) {
        let Some(r) = rect
            .intersection(clip)
            .and_then(|r| r.intersection(&self.bounds()))
        else {
            return;
        };
        for y in r.top..r.bottom {
            let row = y as usize * self.width;
            self.scratch[row + r.left as usize..row + r.right as usize].fill(colour);
        }
    }

    fn draw_text(&mut self, clip: &Rect, x: i32, y: i32, text: &str, colour: Rgba, small: bool) {
        let (gw, gh) = if small { GLYPH_SMALL } else { GLYPH_NORMAL };
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let gx = x + i as i32 * gw;
            // block glyph with one pixel of spacing on each axis
            self.fill_rect(clip, Rect::new(gx, y + 1, gx + gw - 1, y + gh - 1), colour);
        }
    }

    fn scroll(&mut self, rect: Rect, dx: i32, dy: i32) {
        let Some(r) = rect.intersection(&self.bounds()) else {
            return;
        };
        let (w, h) = (r.width() as usize, r.height() as usize);
        let mut tmp = Vec::with_capacity(w * h);
        for y in r.top..r.bottom {
            let row = y as usize * self.width;
            tmp.extend_from_slice(&self.scratch[row + r.left as usize..row + r.right as usize]);
        }
        for ty in 0..h as i32 {
            let y = r.top + ty + dy;
            if y < r.top || y >= r.bottom {
                continue;
            }
            for tx in 0..w as i32 {
                let x = r.left + tx + dx;
                if x < r.left || x >= r.right {
                    continue;
                }
                self.put(x, y, tmp[ty as usize * w + tx as usize]);
            }
        }
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
