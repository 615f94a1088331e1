//! Fixed isometric projection between world space and virtual pixels.
//!
//! ```text
//!        N             sx = (y - x) * 2
//!      /   \           sy =  x + y - z
//!     W     E
//!      \   /           x grows towards the lower left,
//!        S             y grows towards the lower right
//! ```
//!
//! All screen values here are *virtual* pixels ([`ZoomLevel::Normal`]);
//! callers go through [`crate::engine::zoom`] for the last step.
//!
//! [`ZoomLevel::Normal`]: crate::engine::zoom::ZoomLevel::Normal

use glam::{IVec2, ivec2};

use crate::engine::types::TILE_SIZE;
use crate::world::map::TileMap;

/// World `(x, y, z)` → virtual screen point.
#[inline]
pub fn remap_coords(x: i32, y: i32, z: i32) -> IVec2 {
    ivec2((y - x) * 2, x + y - z)
}

/// Like [`remap_coords`], with `z` taken from the terrain surface.
#[inline]
pub fn remap_coords2(map: &impl TileMap, x: i32, y: i32) -> IVec2 {
    remap_coords(x, y, map.slope_pixel_z_outside_map(x, y))
}

/// Virtual screen point → world `(x, y)` on the plane `z = 0`.
///
/// Exact inverse of [`remap_coords`] for `z = 0`; shifts floor.
#[inline]
pub fn inverse_remap_coords(sx: i32, sy: i32) -> IVec2 {
    ivec2((2 * sy - sx) >> 2, (2 * sy + sx) >> 2)
}

/// Result of [`inverse_remap_coords2`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroundPoint {
    pub pos: IVec2,
    /// The point was moved onto the map border.
    pub clamped: bool,
}

/// Virtual screen point → world `(x, y)` on the terrain surface.
///
/// The surface height is found by fixed-point iteration: the ray through the
/// pixel is walked down in shrinking steps so it settles on the first slope it
/// hits instead of oscillating between two faces. With `clamp` the result
/// lies inside `[0, size * TILE_SIZE - 1]` on both axes; without it the
/// point may be anywhere and heights come from the nearest border tile.
pub fn inverse_remap_coords2(map: &impl TileMap, sx: i32, sy: i32, clamp: bool) -> GroundPoint {
    let max_x = map.size_x() * TILE_SIZE - 1;
    let max_y = map.size_y() * TILE_SIZE - 1;
    let limit = |p: IVec2| {
        if clamp {
            ivec2(p.x.clamp(0, max_x), p.y.clamp(0, max_y))
        } else {
            p
        }
    };

    let start = inverse_remap_coords(sx, sy);
    let mut pt = limit(start);
    let mut clamped = pt != start;

    let surface_half = |p: IVec2, lift: i32| {
        let q = limit(p + IVec2::splat(lift));
        map.slope_pixel_z_outside_map(q.x, q.y) / 2
    };

    let mut z = 0;
    for _ in 0..5 {
        z = surface_half(pt, z.max(4) - 4);
    }
    for m in (1..=3).rev() {
        z = surface_half(pt, z.max(m) - m);
    }
    for _ in 0..5 {
        z = surface_half(pt, z);
    }

    let lifted = pt + IVec2::splat(z);
    pt = limit(lifted);
    clamped |= pt != lifted;

    GroundPoint { pos: pt, clamped }
}
