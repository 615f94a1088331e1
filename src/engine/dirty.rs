//! Dirty-rectangle invalidation.
//!
//! World changes are reported as virtual rectangles; every open viewport turns
//! them into a screen rectangle of its own and hands that to a
//! [`RepaintSink`]. Rounding always goes outward: the right and bottom edges
//! are pushed by one zoomed pixel minus one before flooring, then by one more
//! screen pixel.

use glam::IVec2;

use crate::{
    engine::{
        projection::remap_coords,
        types::{
            MAX_TILE_EXTENT_BOTTOM, MAX_TILE_EXTENT_LEFT, MAX_TILE_EXTENT_RIGHT,
            MAX_TILE_EXTENT_TOP, Rect, TILE_HEIGHT, TILE_SIZE,
        },
        viewport::{Viewport, ViewportSet},
        zoom::{ZoomLevel, unscale_by_zoom},
    },
    world::{map::TileMap, signs::ViewportSign},
};

/// External screen-repaint primitive.
pub trait RepaintSink {
    /// `r` is in screen pixels, half-open.
    fn mark_dirty(&mut self, r: Rect);
}

/// Collects repaint requests until the next frame takes them.
#[derive(Debug, Default)]
pub struct DirtyRects {
    rects: Vec<Rect>,
}

impl DirtyRects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Hand out everything marked so far.
    pub fn take(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.rects)
    }

    /// Smallest rectangle covering every pending request.
    pub fn bounds(&self) -> Option<Rect> {
        self.rects.iter().copied().reduce(|a, b| a.union(&b))
    }
}

impl RepaintSink for DirtyRects {
    fn mark_dirty(&mut self, r: Rect) {
        if r.is_empty() {
            return;
        }
        /* the same area is often reported many times per tick */
        if self.rects.last().is_some_and(|last| last.contains_rect(&r)) {
            return;
        }
        self.rects.push(r);
    }
}

/*──────────────────────── viewports ─────────────────────────*/

/// Repaint the part of virtual rectangle `r` that `vp` shows.
pub fn mark_viewport_dirty(vp: &Viewport, r: Rect, sink: &mut dyn RepaintSink) {
    let round = (1 << vp.zoom.shift()) - 1;

    let right = r.right + round - vp.virtual_left;
    if right <= 0 {
        return;
    }
    let bottom = r.bottom + round - vp.virtual_top;
    if bottom <= 0 {
        return;
    }
    let left = (r.left - vp.virtual_left).max(0);
    if left >= vp.virtual_width {
        return;
    }
    let top = (r.top - vp.virtual_top).max(0);
    if top >= vp.virtual_height {
        return;
    }

    let screen = Rect::new(
        unscale_by_zoom(left, vp.zoom) + vp.left,
        unscale_by_zoom(top, vp.zoom) + vp.top,
        unscale_by_zoom(right, vp.zoom) + vp.left + 1,
        unscale_by_zoom(bottom, vp.zoom) + vp.top + 1,
    );
    if let Some(clipped) = screen.intersection(&vp.screen_rect()) {
        sink.mark_dirty(clipped);
    }
}

/// Repaint virtual rectangle `r` in every open viewport.
pub fn mark_all_viewports_dirty(viewports: &ViewportSet, r: Rect, sink: &mut dyn RepaintSink) {
    for (_, vp) in viewports.iter() {
        debug_assert!(vp.width != 0);
        mark_viewport_dirty(vp, r, sink);
    }
}

/// Repaint everything that may be drawn for `tile` at height level `height`,
/// including a bridge `bridge_level_offset` levels above its north corner.
pub fn mark_tile_dirty(
    viewports: &ViewportSet,
    tile: IVec2,
    bridge_level_offset: i32,
    height: i32,
    sink: &mut dyn RepaintSink,
) {
    let pt = remap_coords(tile.x * TILE_SIZE, tile.y * TILE_SIZE, height * TILE_HEIGHT);
    let r = Rect::new(
        pt.x - MAX_TILE_EXTENT_LEFT,
        pt.y - MAX_TILE_EXTENT_TOP - TILE_HEIGHT * bridge_level_offset,
        pt.x + MAX_TILE_EXTENT_RIGHT,
        pt.y + MAX_TILE_EXTENT_BOTTOM,
    );
    mark_all_viewports_dirty(viewports, r, sink);
}

/// [`mark_tile_dirty`] at the tile's current height on `map`.
pub fn mark_tile_dirty_by_tile(
    viewports: &ViewportSet,
    map: &impl TileMap,
    tile: IVec2,
    bridge_level_offset: i32,
    sink: &mut dyn RepaintSink,
) {
    let height = map.tile_height_outside_map(tile.x, tile.y);
    mark_tile_dirty(viewports, tile, bridge_level_offset, height, sink);
}

/// Repaint a sign in every viewport zoomed in no further out than `max_zoom`.
pub fn mark_sign_dirty(
    viewports: &ViewportSet,
    sign: &ViewportSign,
    max_zoom: ZoomLevel,
    sink: &mut dyn RepaintSink,
) {
    for (_, vp) in viewports.iter() {
        if vp.zoom <= max_zoom {
            mark_viewport_dirty(vp, sign.dirty_rect(vp.zoom), sink);
        }
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
