//! Height map, tile kinds and slopes.
//!
//! Heights live on tile corners, so neighbouring tiles always meet without
//! gaps. Anything outside the map reads as the nearest border corner.

use std::collections::HashMap;

use bitflags::bitflags;
use glam::{IVec2, ivec2};

use crate::engine::types::{TILE_HEIGHT, TILE_SIZE};

/// Tile coordinate; may lie outside the map (void border).
pub type TileXY = IVec2;

/*------------------------------ tile kinds -------------------------------*/

/// Closed set of tile kinds; drawers dispatch on it with one `match`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileKind {
    #[default]
    Clear,
    Rail,
    Road,
    House,
    Trees,
    Station,
    Water,
    Industry,
    TunnelBridge,
    Object,
    /// Anything outside the map.
    Void,
}

/*-------------------------------- slopes ---------------------------------*/

bitflags! {
    /// Raised corners of a tile relative to its lowest corner.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Slope: u8 {
        const FLAT  = 0x00;
        const W     = 0x01;
        const S     = 0x02;
        const E     = 0x04;
        const N     = 0x08;
        /// One corner is two levels above the lowest one.
        const STEEP = 0x10;
    }
}

impl Slope {
    pub fn is_steep(self) -> bool {
        self.contains(Slope::STEEP)
    }
}

/// Snapshot of the tile currently being drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileInfo {
    pub tile: TileXY,
    /// World x/y of the north corner.
    pub x: i32,
    pub y: i32,
    /// World z of the lowest corner.
    pub z: i32,
    pub slope: Slope,
    pub kind: TileKind,
}

/*------------------------------ map contract -----------------------------*/

/// Read-only view of the height map and tile kinds.
///
/// Heights are stored per **corner**: tile `(x, y)` has its north corner at
/// corner `(x, y)` and its south corner at `(x + 1, y + 1)`. Implementors
/// provide the four primitives; everything else derives from them.
pub trait TileMap {
    fn size_x(&self) -> i32;
    fn size_y(&self) -> i32;

    /// Height level of a corner; `x ∈ 0..=size_x`, `y ∈ 0..=size_y`.
    fn corner_height(&self, x: i32, y: i32) -> i32;

    /// Kind of a tile inside the map.
    fn tile_kind_inside(&self, x: i32, y: i32) -> TileKind;

    /// Height level of a bridge deck spanning over the tile, if any.
    fn bridge_height(&self, _x: i32, _y: i32) -> Option<i32> {
        None
    }

    /*----------------------------- derived --------------------------------*/

    #[inline]
    fn is_inside(&self, x: i32, y: i32) -> bool {
        (0..self.size_x()).contains(&x) && (0..self.size_y()).contains(&y)
    }

    fn tile_kind(&self, x: i32, y: i32) -> TileKind {
        if self.is_inside(x, y) {
            self.tile_kind_inside(x, y)
        } else {
            TileKind::Void
        }
    }

    /// Height of the nearest corner inside the map.
    fn tile_height_outside_map(&self, x: i32, y: i32) -> i32 {
        self.corner_height(x.clamp(0, self.size_x()), y.clamp(0, self.size_y()))
    }

    fn tile_pixel_height_outside_map(&self, x: i32, y: i32) -> i32 {
        self.tile_height_outside_map(x, y) * TILE_HEIGHT
    }

    /// Slope and lowest corner height level, corners clamped to the map.
    fn tile_slope_outside_map(&self, x: i32, y: i32) -> (Slope, i32) {
        let n = self.tile_height_outside_map(x, y);
        let w = self.tile_height_outside_map(x + 1, y);
        let e = self.tile_height_outside_map(x, y + 1);
        let s = self.tile_height_outside_map(x + 1, y + 1);
        let min = n.min(w).min(e).min(s);

        let mut bits = 0u8;
        for (h, corner) in [(n, Slope::N), (e, Slope::E), (s, Slope::S), (w, Slope::W)] {
            let d = h - min;
            if d > 0 {
                bits |= corner.bits();
                if d > 1 {
                    bits |= Slope::STEEP.bits();
                }
            }
        }
        (Slope::from_bits_retain(bits), min)
    }

    fn tile_pixel_slope_outside_map(&self, x: i32, y: i32) -> (Slope, i32) {
        let (slope, h) = self.tile_slope_outside_map(x, y);
        (slope, h * TILE_HEIGHT)
    }

    /// Surface height (world z) at a world point, corners clamped to the map.
    ///
    /// Bilinear across the four corners of the containing tile.
    fn slope_pixel_z_outside_map(&self, x: i32, y: i32) -> i32 {
        let tx = x.div_euclid(TILE_SIZE);
        let ty = y.div_euclid(TILE_SIZE);
        let fx = x.rem_euclid(TILE_SIZE);
        let fy = y.rem_euclid(TILE_SIZE);

        let n = self.tile_pixel_height_outside_map(tx, ty);
        let w = self.tile_pixel_height_outside_map(tx + 1, ty);
        let e = self.tile_pixel_height_outside_map(tx, ty + 1);
        let s = self.tile_pixel_height_outside_map(tx + 1, ty + 1);

        let inv_x = TILE_SIZE - fx;
        let inv_y = TILE_SIZE - fy;
        (n * inv_x * inv_y + w * fx * inv_y + e * inv_x * fy + s * fx * fy)
            / (TILE_SIZE * TILE_SIZE)
    }

    /// Surface height at a world point that must be inside the map.
    fn slope_pixel_z(&self, x: i32, y: i32) -> i32 {
        debug_assert!(
            self.is_inside(x.div_euclid(TILE_SIZE), y.div_euclid(TILE_SIZE)),
            "({x}, {y}) outside map"
        );
        self.slope_pixel_z_outside_map(x, y)
    }

    /// Gather the [`TileInfo`] for any tile coordinate, void included.
    fn tile_info(&self, tile: TileXY) -> TileInfo {
        let kind = self.tile_kind(tile.x, tile.y);
        let (slope, z) = self.tile_pixel_slope_outside_map(tile.x, tile.y);
        TileInfo {
            tile,
            x: tile.x * TILE_SIZE,
            y: tile.y * TILE_SIZE,
            z,
            slope,
            kind,
        }
    }
}

/*----------------------------- in-memory map -----------------------------*/

/// Plain corner-height grid with per-tile kinds and a sparse bridge table.
#[derive(Clone, Debug)]
pub struct HeightMap {
    size_x: i32,
    size_y: i32,
    corners: Vec<u8>,
    kinds: Vec<TileKind>,
    bridges: HashMap<TileXY, i32>,
}

impl HeightMap {
    /// Flat map of `size_x × size_y` tiles at height 0, all [`TileKind::Clear`].
    pub fn new(size_x: i32, size_y: i32) -> Self {
        assert!(size_x > 0 && size_y > 0, "map needs at least one tile");
        Self {
            size_x,
            size_y,
            corners: vec![0; ((size_x + 1) * (size_y + 1)) as usize],
            kinds: vec![TileKind::Clear; (size_x * size_y) as usize],
            bridges: HashMap::new(),
        }
    }

    /// Build a map whose corner heights come from `height(x, y)`.
    pub fn from_fn(size_x: i32, size_y: i32, mut height: impl FnMut(i32, i32) -> u8) -> Self {
        let mut map = Self::new(size_x, size_y);
        for y in 0..=size_y {
            for x in 0..=size_x {
                map.set_corner_height(x, y, height(x, y));
            }
        }
        map
    }

    #[inline]
    fn corner_idx(&self, x: i32, y: i32) -> usize {
        (y * (self.size_x + 1) + x) as usize
    }

    pub fn set_corner_height(&mut self, x: i32, y: i32, h: u8) {
        let idx = self.corner_idx(x, y);
        self.corners[idx] = h;
    }

    /// Lift all four corners of a tile by `levels`.
    pub fn raise_tile(&mut self, x: i32, y: i32, levels: u8) {
        for (cx, cy) in [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)] {
            let idx = self.corner_idx(cx, cy);
            self.corners[idx] = self.corners[idx].saturating_add(levels);
        }
    }

    pub fn set_kind(&mut self, x: i32, y: i32, kind: TileKind) {
        debug_assert!(self.is_inside(x, y));
        let idx = (y * self.size_x + x) as usize;
        self.kinds[idx] = kind;
    }

    /// Register a bridge deck at `height` levels above sea over tile `(x, y)`.
    pub fn set_bridge(&mut self, x: i32, y: i32, height: Option<i32>) {
        match height {
            Some(h) => self.bridges.insert(ivec2(x, y), h),
            None => self.bridges.remove(&ivec2(x, y)),
        };
    }
}

impl TileMap for HeightMap {
    fn size_x(&self) -> i32 {
        self.size_x
    }

    fn size_y(&self) -> i32 {
        self.size_y
    }

    fn corner_height(&self, x: i32, y: i32) -> i32 {
        self.corners[self.corner_idx(x, y)] as i32
    }

    fn tile_kind_inside(&self, x: i32, y: i32) -> TileKind {
        self.kinds[(y * self.size_x + x) as usize]
    }

    fn bridge_height(&self, x: i32, y: i32) -> Option<i32> {
        self.bridges.get(&ivec2(x, y)).copied()
    }
}

/*================================ Tests =================================*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_tile_has_flat_slope() {
        let map = HeightMap::from_fn(4, 4, |_, _| 3);
        assert_eq!(map.tile_slope_outside_map(1, 1), (Slope::FLAT, 3));
        assert_eq!(map.tile_info(ivec2(1, 1)).z, 3 * TILE_HEIGHT);
    }

    #[test]
    fn raised_north_corner() {
        let mut map = HeightMap::new(4, 4);
        map.set_corner_height(1, 1, 1);
        let (slope, z) = map.tile_slope_outside_map(1, 1);
        assert_eq!(slope, Slope::N);
        assert_eq!(z, 0);
        // the same corner is the south corner of tile (0, 0)
        assert_eq!(map.tile_slope_outside_map(0, 0).0, Slope::S);
    }

    #[test]
    fn steep_slope_is_flagged() {
        let mut map = HeightMap::new(2, 2);
        map.set_corner_height(0, 0, 2);
        map.set_corner_height(1, 0, 1);
        map.set_corner_height(0, 1, 1);
        let (slope, _) = map.tile_slope_outside_map(0, 0);
        assert!(slope.is_steep());
        assert!(slope.contains(Slope::N | Slope::W | Slope::E));
    }

    #[test]
    fn outside_lookups_clamp_to_border() {
        let mut map = HeightMap::new(3, 3);
        map.set_corner_height(0, 0, 5);
        assert_eq!(map.tile_height_outside_map(-10, -4), 5);
        assert_eq!(map.tile_kind(-1, 0), TileKind::Void);
        assert_eq!(map.tile_kind(3, 0), TileKind::Void);
    }

    #[test]
    fn slope_z_interpolates_between_corners() {
        let mut map = HeightMap::new(2, 2);
        map.set_corner_height(1, 0, 2); // west corner of tile (0, 0)
        assert_eq!(map.slope_pixel_z(0, 0), 0);
        assert_eq!(map.slope_pixel_z(TILE_SIZE, 0), 2 * TILE_HEIGHT);
        assert_eq!(map.slope_pixel_z(TILE_SIZE / 2, 0), TILE_HEIGHT);
    }

    #[test]
    fn bridge_table_roundtrip() {
        let mut map = HeightMap::new(2, 2);
        map.set_bridge(1, 1, Some(4));
        assert_eq!(map.bridge_height(1, 1), Some(4));
        map.set_bridge(1, 1, None);
        assert_eq!(map.bridge_height(1, 1), None);
    }
}
