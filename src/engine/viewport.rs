//! Viewports: a screen frame looking at the map at one zoom level.
//!
//! A viewport keeps two positions in virtual pixels:
//!
//! * `scroll` / `dest_scroll` – where it is and where it is heading; moved by
//!   [`Viewport::scroll_to`] and [`Viewport::update_position`].
//! * `virtual_left` / `virtual_top` – what is on screen right now; only
//!   [`Viewport::set_position`] changes them and it keeps the frame buffer in
//!   step by scrolling pixels and repainting the uncovered strips.

use glam::{IVec2, IVec3, ivec2};

use crate::{
    config::ViewportConfig,
    engine::{
        dirty::RepaintSink,
        projection::{inverse_remap_coords2, remap_coords, remap_coords2},
        sprites::ZOOM_BASE,
        types::{Rect, TILE_SIZE},
        zoom::{ZoomLevel, scale_by_zoom, unscale_by_zoom},
    },
    renderer::Blitter,
    world::map::TileMap,
};

/// Opaque handle of a followed object; resolved by the caller.
pub type FollowId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomStep {
    In,
    Out,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    /* screen frame */
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,

    pub zoom: ZoomLevel,

    /* virtual area currently shown */
    pub virtual_left: i32,
    pub virtual_top: i32,
    pub virtual_width: i32,
    pub virtual_height: i32,

    pub scroll: IVec2,
    pub dest_scroll: IVec2,
    pub follow: Option<FollowId>,
}

/// Signed division rounding away from zero; `b > 0`.
#[inline]
fn div_away_from_zero(a: i32, b: i32) -> i32 {
    if a > 0 { (a + b - 1) / b } else { (a - b + 1) / b }
}

/// Scale a distance tuned for a 256 × 256 map to this map's size.
fn scale_by_map_size_1d(n: i32, map: &impl TileMap) -> i32 {
    let n = n as i64 * (map.size_x() + map.size_y()) as i64;
    ((n + 511) / 512) as i32
}

impl Viewport {
    /// Frame at screen `(left, top)` centred on world point `focus`.
    pub fn new(left: i32, top: i32, width: i32, height: i32, zoom: ZoomLevel, focus: IVec3) -> Self {
        let mut vp = Self {
            left,
            top,
            width,
            height,
            zoom,
            virtual_left: 0,
            virtual_top: 0,
            virtual_width: scale_by_zoom(width, zoom),
            virtual_height: scale_by_zoom(height, zoom),
            scroll: IVec2::ZERO,
            dest_scroll: IVec2::ZERO,
            follow: None,
        };
        let pt = vp.map_xyz_to_viewport(focus.x, focus.y, focus.z);
        vp.scroll = pt;
        vp.dest_scroll = pt;
        vp.virtual_left = pt.x;
        vp.virtual_top = pt.y;
        log::debug!(
            "viewport {width}x{height} at ({left}, {top}), {zoom:?}, focus {focus}"
        );
        vp
    }

    /// Like [`new`](Self::new), centred on the north corner of `tile`.
    pub fn at_tile(
        map: &impl TileMap,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        zoom: ZoomLevel,
        tile: IVec2,
    ) -> Self {
        let (x, y) = (tile.x * TILE_SIZE, tile.y * TILE_SIZE);
        let z = map.slope_pixel_z_outside_map(x, y);
        Self::new(left, top, width, height, zoom, IVec3::new(x, y, z))
    }

    /// Screen frame, half-open.
    pub fn screen_rect(&self) -> Rect {
        Rect::from_size(self.left, self.top, self.width, self.height)
    }

    /// Virtual area currently shown.
    pub fn virtual_rect(&self) -> Rect {
        Rect::from_size(self.virtual_left, self.virtual_top, self.virtual_width, self.virtual_height)
    }

    /// Scroll position that centres world point `(x, y, z)`.
    pub fn map_xyz_to_viewport(&self, x: i32, y: i32, z: i32) -> IVec2 {
        remap_coords(x, y, z) - ivec2(self.virtual_width / 2, self.virtual_height / 2)
    }

    /// World point on the terrain under screen pixel `(x, y)`, or `None` when
    /// the pixel is outside the frame.
    pub fn translate_xy_to_tile_coord(
        &self,
        map: &impl TileMap,
        x: i32,
        y: i32,
        clamp: bool,
    ) -> Option<IVec2> {
        if !self.screen_rect().contains(x, y) {
            return None;
        }
        let vx = scale_by_zoom(x - self.left, self.zoom) + self.virtual_left;
        let vy = scale_by_zoom(y - self.top, self.zoom) + self.virtual_top;
        Some(inverse_remap_coords2(map, vx, vy, clamp).pos)
    }

    /// Follow an object; [`update_position`](Self::update_position) keeps it
    /// centred.
    pub fn set_follow(&mut self, id: Option<FollowId>) {
        self.follow = id;
    }

    /// Head for world `(x, y)`; `z` defaults to the terrain height there.
    ///
    /// Stops following. Returns `false` when the destination did not change.
    pub fn scroll_to(&mut self, map: &impl TileMap, x: i32, y: i32, z: Option<i32>, instant: bool) -> bool {
        let z = z.unwrap_or_else(|| {
            let inside = (0..map.size_x() * TILE_SIZE).contains(&x) && (0..map.size_y() * TILE_SIZE).contains(&y);
            if inside {
                map.slope_pixel_z(x, y)
            } else {
                map.tile_pixel_height_outside_map(x.div_euclid(TILE_SIZE), y.div_euclid(TILE_SIZE))
            }
        });

        let pt = self.map_xyz_to_viewport(x, y, z);
        self.follow = None;
        if self.dest_scroll == pt {
            return false;
        }
        if instant {
            self.scroll = pt;
        }
        self.dest_scroll = pt;
        true
    }

    pub fn scroll_to_tile(&mut self, map: &impl TileMap, tile: IVec2, instant: bool) -> bool {
        self.scroll_to(map, tile.x * TILE_SIZE, tile.y * TILE_SIZE, None, instant)
    }

    /// Move `scroll` so the frame centre shows a point on the map.
    pub fn clamp_to_map(&self, map: &impl TileMap, scroll: IVec2) -> IVec2 {
        let half = ivec2(self.virtual_width / 2, self.virtual_height / 2);
        let centre = scroll + half;
        let gp = inverse_remap_coords2(map, centre.x, centre.y, true);
        if gp.clamped {
            remap_coords2(map, gp.pos.x, gp.pos.y) - half
        } else {
            scroll
        }
    }

    /// Advance one tick towards the destination (or the followed object) and
    /// bring the screen up to date.
    pub fn update_position(
        &mut self,
        map: &impl TileMap,
        cfg: &ViewportConfig,
        locate: impl FnOnce(FollowId) -> Option<IVec3>,
        blitter: &mut dyn Blitter,
        sink: &mut dyn RepaintSink,
    ) {
        if let Some(id) = self.follow {
            match locate(id) {
                Some(p) => {
                    let pt = self.map_xyz_to_viewport(p.x, p.y, p.z);
                    self.scroll = pt;
                    self.set_position(pt.x, pt.y, blitter, sink);
                    return;
                }
                None => {
                    log::warn!("followed object {id} is gone");
                    self.follow = None;
                }
            }
        }

        self.dest_scroll = self.clamp_to_map(map, self.dest_scroll);
        let delta = self.dest_scroll - self.scroll;
        if delta != IVec2::ZERO {
            if cfg.smooth_scroll {
                let max_scroll = scale_by_map_size_1d(512 * ZOOM_BASE, map);
                let step = |d: i32| div_away_from_zero(d, 4).clamp(-max_scroll, max_scroll);
                self.scroll += ivec2(step(delta.x), step(delta.y));
            } else {
                self.scroll = self.dest_scroll;
            }
        }
        self.scroll = self.clamp_to_map(map, self.scroll);
        self.set_position(self.scroll.x, self.scroll.y, blitter, sink);
    }

    /// Show virtual `(x, y)` at the top-left corner.
    ///
    /// Old and new positions are floored to screen pixels before taking the
    /// difference, the same rounding the compositor uses for its origin.
    pub fn set_position(&mut self, x: i32, y: i32, blitter: &mut dyn Blitter, sink: &mut dyn RepaintSink) {
        let old = ivec2(unscale_by_zoom(self.virtual_left, self.zoom), unscale_by_zoom(self.virtual_top, self.zoom));
        self.virtual_left = x;
        self.virtual_top = y;
        let new = ivec2(unscale_by_zoom(x, self.zoom), unscale_by_zoom(y, self.zoom));

        let offs = old - new;
        if offs == IVec2::ZERO {
            return;
        }

        let (sw, sh) = blitter.size();
        let screen = Rect::new(0, 0, sw as i32, sh as i32);
        let Some(frame) = self.screen_rect().intersection(&screen) else {
            return;
        };
        scroll_frame(frame, offs, blitter, sink);
    }

    /// Zoom one step, keeping the centre. Returns `false` at the configured
    /// limit.
    pub fn zoom_in_out(&mut self, step: ZoomStep, cfg: &ViewportConfig, sink: &mut dyn RepaintSink) -> bool {
        match step {
            ZoomStep::In => {
                let Some(z) = self.zoom.zoomed_in().filter(|&z| z >= cfg.zoom_min) else {
                    return false;
                };
                self.zoom = z;
                self.virtual_width >>= 1;
                self.virtual_height >>= 1;
                let d = ivec2(self.virtual_width >> 1, self.virtual_height >> 1);
                self.scroll += d;
                self.dest_scroll += d;
            }
            ZoomStep::Out => {
                let Some(z) = self.zoom.zoomed_out().filter(|&z| z <= cfg.zoom_max) else {
                    return false;
                };
                self.zoom = z;
                self.virtual_width <<= 1;
                self.virtual_height <<= 1;
                let d = ivec2(self.virtual_width >> 2, self.virtual_height >> 2);
                self.scroll -= d;
                self.dest_scroll -= d;
            }
        }
        self.virtual_left = self.scroll.x;
        self.virtual_top = self.scroll.y;
        sink.mark_dirty(self.screen_rect());
        log::debug!("viewport zoom {:?}", self.zoom);
        true
    }

    /// Bring the zoom level back inside the configured range.
    pub fn constrain_zoom(&mut self, cfg: &ViewportConfig, sink: &mut dyn RepaintSink) {
        let target = self.zoom.clamp_to(cfg.zoom_min, cfg.zoom_max);
        while self.zoom < target && self.zoom_in_out(ZoomStep::Out, cfg, sink) {}
        while self.zoom > target && self.zoom_in_out(ZoomStep::In, cfg, sink) {}
    }
}

/// Move the pixels of `frame` by `offs` and repaint what was uncovered.
fn scroll_frame(frame: Rect, offs: IVec2, blitter: &mut dyn Blitter, sink: &mut dyn RepaintSink) {
    let (mut left, top) = (frame.left, frame.top);
    let (mut width, height) = (frame.width(), frame.height());

    if offs.x.abs() >= width || offs.y.abs() >= height {
        sink.mark_dirty(frame);
        return;
    }

    blitter.scroll(frame, offs.x, offs.y);

    if offs.x > 0 {
        sink.mark_dirty(Rect::new(left, top, left + offs.x, top + height));
        left += offs.x;
        width -= offs.x;
    } else if offs.x < 0 {
        sink.mark_dirty(Rect::new(left + width + offs.x, top, left + width, top + height));
        width += offs.x;
    }

    if offs.y > 0 {
        sink.mark_dirty(Rect::new(left, top, left + width, top + offs.y));
    } else if offs.y < 0 {
        sink.mark_dirty(Rect::new(left, top + height + offs.y, left + width, top + height));
    }
}

/*──────────────────────── registry ──────────────────────────*/

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewportId(u32);

/// Open viewports, back to front.
#[derive(Default)]
pub struct ViewportSet {
    slots: Vec<Option<Viewport>>,
}

impl ViewportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, vp: Viewport) -> ViewportId {
        let idx = match self.slots.iter().position(Option::is_none) {
            Some(i) => {
                self.slots[i] = Some(vp);
                i
            }
            None => {
                self.slots.push(Some(vp));
                self.slots.len() - 1
            }
        };
        ViewportId(idx as u32)
    }

    pub fn close(&mut self, id: ViewportId) -> Option<Viewport> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    pub fn get(&self, id: ViewportId) -> Option<&Viewport> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ViewportId) -> Option<&mut Viewport> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewportId, &Viewport)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|vp| (ViewportId(i as u32), vp)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ViewportId, &mut Viewport)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|vp| (ViewportId(i as u32), vp)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Topmost viewport whose frame contains screen `(x, y)`.
    pub fn at_point(&self, x: i32, y: i32) -> Option<ViewportId> {
        self.iter()
            .filter(|(_, vp)| vp.screen_rect().contains(x, y))
            .map(|(id, _)| id)
            .last()
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::dirty::DirtyRects, renderer::software::Software, world::map::HeightMap};
    use glam::ivec3;

    fn centred(map: &HeightMap, zoom: ZoomLevel) -> Viewport {
        Viewport::at_tile(map, 0, 0, 200, 100, zoom, ivec2(10, 10))
    }

    #[test]
    fn new_centres_the_focus() {
        let vp = Viewport::new(0, 0, 200, 100, ZoomLevel::Out2x, ivec3(0, 0, 0));
        assert_eq!(vp.virtual_width, 400);
        assert_eq!(vp.scroll, ivec2(-200, -100));
        assert_eq!(vp.dest_scroll, vp.scroll);
    }

    #[test]
    fn screen_centre_translates_to_focus_tile() {
        let map = HeightMap::new(64, 64);
        let vp = centred(&map, ZoomLevel::Normal);
        assert_eq!(vp.translate_xy_to_tile_coord(&map, 100, 50, false), Some(ivec2(160, 160)));
        assert_eq!(vp.translate_xy_to_tile_coord(&map, 200, 50, false), None);
        assert_eq!(vp.translate_xy_to_tile_coord(&map, -1, 50, false), None);
    }

    #[test]
    fn scroll_to_reports_unchanged_destination() {
        let map = HeightMap::new(64, 64);
        let mut vp = centred(&map, ZoomLevel::Normal);
        vp.set_follow(Some(7));
        assert!(!vp.scroll_to_tile(&map, ivec2(10, 10), false));
        assert_eq!(vp.follow, None);

        let before = vp.scroll;
        assert!(vp.scroll_to_tile(&map, ivec2(20, 10), false));
        assert_eq!(vp.scroll, before);
        assert!(vp.scroll_to_tile(&map, ivec2(20, 20), true));
        assert_eq!(vp.scroll, vp.dest_scroll);
    }

    #[test]
    fn smooth_scroll_moves_a_quarter() {
        let map = HeightMap::new(64, 64);
        let mut vp = Viewport::at_tile(&map, 0, 0, 200, 100, ZoomLevel::Normal, ivec2(32, 32));
        let mut sw = Software::new(200, 100);
        let mut dirty = DirtyRects::new();
        let start = vp.scroll;
        vp.dest_scroll = start + ivec2(101, -6);

        vp.update_position(&map, &ViewportConfig::default(), |_| None, &mut sw, &mut dirty);
        assert_eq!(vp.scroll, start + ivec2(26, -2));
        assert_eq!(vp.virtual_left, vp.scroll.x);

        let cfg = ViewportConfig { smooth_scroll: false, ..ViewportConfig::default() };
        vp.update_position(&map, &cfg, |_| None, &mut sw, &mut dirty);
        assert_eq!(vp.scroll, vp.dest_scroll);
    }

    #[test]
    fn following_tracks_the_object() {
        let map = HeightMap::new(64, 64);
        let mut vp = centred(&map, ZoomLevel::Normal);
        let mut sw = Software::new(200, 100);
        let mut dirty = DirtyRects::new();
        vp.set_follow(Some(3));
        let target = ivec3(300, 200, 8);
        vp.update_position(&map, &ViewportConfig::default(), |_| Some(target), &mut sw, &mut dirty);
        assert_eq!(vp.scroll, vp.map_xyz_to_viewport(300, 200, 8));

        vp.update_position(&map, &ViewportConfig::default(), |_| None, &mut sw, &mut dirty);
        assert_eq!(vp.follow, None);
    }

    #[test]
    fn destination_off_the_map_is_clamped() {
        let map = HeightMap::new(16, 16);
        let vp = centred(&map, ZoomLevel::Normal);
        let far = vp.map_xyz_to_viewport(-4000, -4000, 0);
        let clamped = vp.clamp_to_map(&map, far);
        let centre = clamped + ivec2(vp.virtual_width / 2, vp.virtual_height / 2);
        let gp = inverse_remap_coords2(&map, centre.x, centre.y, false);
        assert!(gp.pos.x >= -1 && gp.pos.y >= -1, "{:?}", gp.pos);
        assert!(gp.pos.x <= 2 && gp.pos.y <= 2, "{:?}", gp.pos);
    }

    #[test]
    fn small_move_scrolls_and_repaints_strips() {
        let map = HeightMap::new(16, 16);
        let mut vp = Viewport::at_tile(&map, 0, 0, 8, 8, ZoomLevel::Normal, ivec2(4, 4));
        let mut sw = Software::new(8, 8);
        let mut dirty = DirtyRects::new();

        let (x, y) = (vp.virtual_left, vp.virtual_top);
        vp.set_position(x + 2, y - 3, &mut sw, &mut dirty);
        assert_eq!(dirty.take(), vec![Rect::new(6, 0, 8, 8), Rect::new(0, 0, 6, 3)]);

        vp.set_position(x + 100, y, &mut sw, &mut dirty);
        assert_eq!(dirty.take(), vec![Rect::new(0, 0, 8, 8)]);
    }

    #[test]
    fn sub_pixel_moves_follow_floor() {
        let mut vp = Viewport::new(0, 0, 8, 8, ZoomLevel::Out4x, ivec3(0, 0, 0));
        let mut sw = Software::new(8, 8);
        let mut dirty = DirtyRects::new();
        vp.set_position(0, 0, &mut sw, &mut dirty);
        dirty.take();

        // -1 floors to screen -1: one pixel of movement, not zero
        vp.set_position(-1, 0, &mut sw, &mut dirty);
        assert_eq!(dirty.take(), vec![Rect::new(0, 0, 1, 8)]);
        vp.set_position(-4, 0, &mut sw, &mut dirty);
        assert!(dirty.is_empty());
    }

    #[test]
    fn zoom_keeps_centre_and_respects_limits() {
        let map = HeightMap::new(64, 64);
        let mut vp = centred(&map, ZoomLevel::Normal);
        let mut dirty = DirtyRects::new();
        let cfg = ViewportConfig { zoom_max: ZoomLevel::Out2x, ..ViewportConfig::default() };
        let centre = |vp: &Viewport| vp.scroll + ivec2(vp.virtual_width / 2, vp.virtual_height / 2);
        let c0 = centre(&vp);

        assert!(vp.zoom_in_out(ZoomStep::Out, &cfg, &mut dirty));
        assert_eq!(centre(&vp), c0);
        assert!(!vp.zoom_in_out(ZoomStep::Out, &cfg, &mut dirty));
        assert!(vp.zoom_in_out(ZoomStep::In, &cfg, &mut dirty));
        assert_eq!(centre(&vp), c0);
        assert!(!vp.zoom_in_out(ZoomStep::In, &cfg, &mut dirty));
        assert_eq!(dirty.rects().len(), 1, "same frame marked twice collapses");
    }

    #[test]
    fn constrain_zoom_walks_into_range() {
        let map = HeightMap::new(64, 64);
        let mut vp = centred(&map, ZoomLevel::Out32x);
        let mut dirty = DirtyRects::new();
        let cfg = ViewportConfig { zoom_max: ZoomLevel::Out4x, ..ViewportConfig::default() };
        vp.constrain_zoom(&cfg, &mut dirty);
        assert_eq!(vp.zoom, ZoomLevel::Out4x);
        assert_eq!(vp.virtual_width, 200 << 2);
    }

    #[test]
    fn set_reuses_closed_slots() {
        let mut set = ViewportSet::new();
        let vp = Viewport::new(0, 0, 10, 10, ZoomLevel::Normal, ivec3(0, 0, 0));
        let a = set.open(vp.clone());
        let b = set.open(Viewport { left: 5, ..vp.clone() });
        assert_eq!(set.at_point(6, 6), Some(b));
        set.close(a);
        assert_eq!(set.len(), 1);
        assert_eq!(set.open(vp), a);
    }
}
