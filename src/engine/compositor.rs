//! Frame compositor: turns a dirty screen rectangle into pixels.
//!
//! ```text
//!  draw_viewport   clip to the viewport frame
//!    draw_chk      bisect until the virtual area is small enough
//!      do_draw     one pass:
//!                    collect  landscape → objects → signs
//!                    blit     ground → sorted parents (+children)
//!                             → debug boxes → dirty blocks
//!                             → overlay → sign texts
//! ```
//!
//! The compositor owns the sprite buffers and reuses them for every pass;
//! they are empty between passes.

use crate::{
    config::ViewportConfig,
    engine::{
        projection::remap_coords,
        sprites::{SpriteBuffers, SpriteCollector, WorldBox, ZOOM_BASE},
        traversal::{TileDrawer, add_landscape},
        types::{DrawRegion, Rect},
        viewport::{Viewport, ViewportSet},
        zoom::{scale_by_zoom, unscale_by_zoom, zoom_mask},
    },
    renderer::{Blitter, Rgba, font_height, text_width},
    world::{
        map::TileMap,
        signs::{SignIndex, VPSM_BOTTOM, VPSM_LEFT, VPSM_RIGHT, VPSM_TOP, add_signs},
        sprite::{SPR_EMPTY_BOUNDING_BOX, SpriteBank},
    },
};

/// Emits sortable sprites for moving or free-standing things (vehicles,
/// effects) into a pass.
pub trait ObjectDrawer {
    fn draw_objects(&self, vd: &mut SpriteCollector<'_>);
}

/// Screen-space layer drawn above the world and below sign texts.
pub trait Overlay {
    fn draw(&self, region: &DrawRegion, blitter: &mut dyn Blitter);
}

/// Everything a pass reads.
pub struct Scene<'a, M: TileMap> {
    pub map: &'a M,
    pub tiles: &'a dyn TileDrawer,
    pub bank: &'a SpriteBank,
    pub objects: &'a [&'a dyn ObjectDrawer],
    pub signs: Option<&'a SignIndex>,
    pub overlay: Option<&'a dyn Overlay>,
}

/// Counters for the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: u32,
    pub tiles: u32,
    pub parents: u32,
    pub children: u32,
    pub strings: u32,
}

const BOUNDING_BOX_COLOUR: Rgba = 0xFF_FF_FF_FF;

/* cycled once per frame while dirty blocks are shown */
const DIRTY_BLOCK_COLOURS: [Rgba; 16] = [
    0xFF_E0_30_30, 0xFF_30_E0_30, 0xFF_30_30_E0, 0xFF_E0_E0_30,
    0xFF_E0_30_E0, 0xFF_30_E0_E0, 0xFF_F0_90_20, 0xFF_90_20_F0,
    0xFF_20_F0_90, 0xFF_F0_20_90, 0xFF_90_F0_20, 0xFF_20_90_F0,
    0xFF_FF_FF_FF, 0xFF_A0_A0_A0, 0xFF_60_60_60, 0xFF_00_00_00,
];

pub struct Compositor {
    cfg: ViewportConfig,
    buf: SpriteBuffers,
    dirty_block_colour: usize,
    stats: FrameStats,
}

impl Compositor {
    pub fn new(cfg: ViewportConfig) -> Self {
        Self {
            cfg,
            buf: SpriteBuffers::default(),
            dirty_block_colour: 0,
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.cfg
    }

    pub fn config_mut(&mut self) -> &mut ViewportConfig {
        &mut self.cfg
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Start a new frame: reset counters, step the dirty-block colour.
    pub fn next_frame(&mut self) {
        self.stats = FrameStats::default();
        self.dirty_block_colour = self.dirty_block_colour.wrapping_add(1);
    }

    /// Repaint every screen rectangle in `dirty` in every viewport.
    pub fn redraw<M: TileMap>(
        &mut self,
        viewports: &ViewportSet,
        dirty: &[Rect],
        scene: &Scene<'_, M>,
        blitter: &mut dyn Blitter,
    ) {
        for r in dirty {
            for (_, vp) in viewports.iter() {
                self.draw_viewport(vp, *r, scene, blitter);
            }
        }
        log::trace!("frame: {} rects, {:?}", dirty.len(), self.stats);
    }

    /// Repaint screen rectangle `r` of `vp`; the part outside the frame is
    /// ignored.
    pub fn draw_viewport<M: TileMap>(
        &mut self,
        vp: &Viewport,
        r: Rect,
        scene: &Scene<'_, M>,
        blitter: &mut dyn Blitter,
    ) {
        let Some(r) = r.intersection(&vp.screen_rect()) else {
            return;
        };
        self.draw_chk(vp, r, scene, blitter);
    }

    /// Bisect `r` (screen pixels) until its virtual area fits one pass.
    fn draw_chk<M: TileMap>(&mut self, vp: &Viewport, r: Rect, scene: &Scene<'_, M>, blitter: &mut dyn Blitter) {
        let (w, h) = (r.width(), r.height());
        let area = scale_by_zoom(h, vp.zoom) as i64 * scale_by_zoom(w, vp.zoom) as i64;
        let limit = self.cfg.max_draw_area * (ZOOM_BASE * ZOOM_BASE) as i64;

        if area > limit && (w > 1 || h > 1) {
            let (a, b) = if h > w {
                let t = (r.top + r.bottom) >> 1;
                (Rect { bottom: t, ..r }, Rect { top: t, ..r })
            } else {
                let t = (r.left + r.right) >> 1;
                (Rect { right: t, ..r }, Rect { left: t, ..r })
            };
            log::trace!("split {r:?} (area {area}) into {a:?} + {b:?}");
            self.draw_chk(vp, a, scene, blitter);
            self.draw_chk(vp, b, scene, blitter);
            return;
        }

        let z = vp.zoom;
        let virt = Rect::new(
            scale_by_zoom(r.left - vp.left, z) + vp.virtual_left,
            scale_by_zoom(r.top - vp.top, z) + vp.virtual_top,
            scale_by_zoom(r.right - vp.left, z) + vp.virtual_left,
            scale_by_zoom(r.bottom - vp.top, z) + vp.virtual_top,
        );
        self.do_draw(vp, virt, scene, blitter);
    }

    /// One compositing pass over virtual rectangle `virt`.
    fn do_draw<M: TileMap>(&mut self, vp: &Viewport, virt: Rect, scene: &Scene<'_, M>, blitter: &mut dyn Blitter) {
        let zoom = vp.zoom;
        let mask = zoom_mask(zoom);
        let left = virt.left & mask;
        let top = virt.top & mask;
        let region = DrawRegion {
            left,
            top,
            width: (virt.right - virt.left) & mask,
            height: (virt.bottom - virt.top) & mask,
            zoom,
            screen_x: unscale_by_zoom(left - (vp.virtual_left & mask), zoom) + vp.left,
            screen_y: unscale_by_zoom(top - (vp.virtual_top & mask), zoom) + vp.top,
        };

        /* collect */
        {
            let mut vd = SpriteCollector::new(scene.bank, &mut self.buf, region, self.cfg.draw_bounding_boxes);
            add_landscape(&mut vd, scene.map, scene.tiles, self.cfg.max_bridge_height);
            for obj in scene.objects {
                obj.draw_objects(&mut vd);
            }
            if let Some(signs) = scene.signs {
                add_signs(&mut vd, signs, self.cfg.sign_layers());
            }
        }

        /* blit */
        let bank = scene.bank;
        for ts in &self.buf.tiles {
            blitter.draw_sprite(&region, bank, ts.image, ts.pal, ts.x, ts.y, ts.sub);
        }

        let order = self.cfg.sorter.sort(&self.buf.parents);
        for &i in &order {
            let ps = &self.buf.parents[i];
            if ps.image != SPR_EMPTY_BOUNDING_BOX {
                blitter.draw_sprite(&region, bank, ps.image, ps.pal, ps.x, ps.y, ps.sub);
            }
            for cs in self.buf.children_of(i) {
                blitter.draw_sprite(&region, bank, cs.image, cs.pal, ps.left + cs.x, ps.top + cs.y, cs.sub);
            }
        }

        if self.cfg.draw_bounding_boxes {
            for &i in &order {
                draw_bounding_box(&region, &self.buf.parents[i].bbox, blitter);
            }
        }
        if self.cfg.draw_dirty_blocks {
            let colour = DIRTY_BLOCK_COLOURS[self.dirty_block_colour & 0xF];
            draw_dirty_blocks(&region, colour, blitter);
        }

        if let Some(overlay) = scene.overlay {
            overlay.draw(&region, blitter);
        }
        draw_strings(&region, &self.buf, blitter);

        self.stats.passes += 1;
        self.stats.tiles += self.buf.tiles.len() as u32;
        self.stats.parents += self.buf.parents.len() as u32;
        self.stats.children += self.buf.children.len() as u32;
        self.stats.strings += self.buf.strings.len() as u32;
        log::trace!(
            "pass {:?}: {} tiles, {} parents, {} children, {} strings",
            region.virtual_rect(),
            self.buf.tiles.len(),
            self.buf.parents.len(),
            self.buf.children.len(),
            self.buf.strings.len()
        );

        self.buf.clear();
    }
}

/*──────────────────────── debug layers ──────────────────────*/

/// Wire frame of a world box: the three faces seen from above.
fn draw_bounding_box(region: &DrawRegion, b: &WorldBox, blitter: &mut dyn Blitter) {
    let front = remap_coords(b.xmax + 1, b.ymax + 1, b.zmax + 1);
    let d1 = remap_coords(b.xmin, b.ymax + 1, b.zmax + 1) - front;
    let d2 = remap_coords(b.xmax + 1, b.ymin, b.zmax + 1) - front;
    let d3 = remap_coords(b.xmax + 1, b.ymax + 1, b.zmin) - front;

    let edges = [
        (front, front + d1),
        (front, front + d2),
        (front, front + d3),
        (front + d1, front + d1 + d2),
        (front + d1, front + d1 + d3),
        (front + d2, front + d2 + d1),
        (front + d2, front + d2 + d3),
        (front + d3, front + d3 + d1),
        (front + d3, front + d3 + d2),
    ];
    let clip = region.screen_rect();
    for (p, q) in edges {
        blitter.draw_line(
            &clip,
            region.to_screen_x(p.x),
            region.to_screen_y(p.y),
            region.to_screen_x(q.x),
            region.to_screen_y(q.y),
            BOUNDING_BOX_COLOUR,
        );
    }
}

/// Checkerboard over the whole region; parity follows the virtual origin so
/// neighbouring regions line up.
fn draw_dirty_blocks(region: &DrawRegion, colour: Rgba, blitter: &mut dyn Blitter) {
    let clip = region.screen_rect();
    let right = clip.width();
    let mut parity = unscale_by_zoom(region.left + region.top, region.zoom) & 1;
    for row in 0..clip.height() {
        parity ^= 1;
        let mut i = parity;
        while i < right {
            blitter.set_pixel(&clip, clip.left + i, clip.top + row, colour);
            i += 2;
        }
    }
}

/// Sign frames and texts, centred inside their frames.
fn draw_strings(region: &DrawRegion, buf: &SpriteBuffers, blitter: &mut dyn Blitter) {
    let clip = region.screen_rect();
    for ss in &buf.strings {
        let w = ss.width as i32;
        let x = region.to_screen_x(ss.x);
        let y = region.to_screen_y(ss.y);
        let h = VPSM_TOP + font_height(ss.small) + VPSM_BOTTOM;

        if let Some(colour) = ss.colour {
            blitter.fill_rect(&clip, Rect::new(x, y, x + w + 1, y + h + 1), colour);
        }

        let inner = w - VPSM_LEFT - VPSM_RIGHT;
        let tx = x + VPSM_LEFT + (inner - text_width(&ss.text, ss.small)) / 2;
        blitter.draw_text(&clip, tx, y + VPSM_TOP, &ss.text, ss.text_colour, ss.small);
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
