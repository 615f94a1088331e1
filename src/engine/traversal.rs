//! Visible-tile enumeration for one draw region.
//!
//! Tiles are walked in screen rows and columns of the diamond lattice:
//!
//! ```text
//!   column = y - x        x = (row - column) / 2
//!   row    = x + y        y = (row + column) / 2
//! ```
//!
//! Only `(row, column)` pairs of equal parity name a tile. Rows go from the
//! top of the region downwards, columns left to right, so a tile is always
//! visited after the tiles it may be hidden behind. The walk stops after the
//! first row in which nothing was visible and no bridge further south could
//! still reach up into the region.
//!
//! A tile in column `c` covers screen x `c * 32 - MAX_TILE_EXTENT_LEFT ..
//! c * 32 + MAX_TILE_EXTENT_RIGHT` whatever its height, so the column window
//! is exact: no column outside it can reach the region.

use glam::ivec2;

use crate::{
    engine::{
        projection::inverse_remap_coords,
        sprites::SpriteCollector,
        types::{
            DrawRegion, MAX_TILE_EXTENT_BOTTOM, MAX_TILE_EXTENT_LEFT, MAX_TILE_EXTENT_RIGHT,
            MAX_TILE_EXTENT_TOP, TILE_HEIGHT, TILE_PIXELS, TILE_SIZE,
        },
    },
    world::map::{TileInfo, TileKind, TileMap},
};

/// Emits the sprites of one tile; implementations `match` on `ti.kind`.
pub trait TileDrawer {
    fn draw_tile(&self, ti: &TileInfo, vd: &mut SpriteCollector<'_>);
}

/// Virtual y of a tile's north corner.
#[inline]
fn viewport_y(map: &impl TileMap, x: i32, y: i32) -> i32 {
    y * (TILE_PIXELS / 2) + x * (TILE_PIXELS / 2) - map.tile_pixel_height_outside_map(x, y)
}

/// Call `visit` for every tile, void included, whose worst-case footprint
/// may reach into `region`.
///
/// `max_bridge_height` is in height levels; it bounds how far south the walk
/// keeps looking for bridges rising into the region.
pub fn for_each_visible_tile(
    map: &impl TileMap,
    region: &DrawRegion,
    max_bridge_height: i32,
    mut visit: impl FnMut(TileInfo),
) {
    debug_assert!(region.width >= 0 && region.height >= 0);

    let upper_left = inverse_remap_coords(region.left, region.top);

    /* columns whose footprint reaches into left..right */
    let left_column = (region.left - MAX_TILE_EXTENT_RIGHT).div_euclid(TILE_PIXELS) + 1;
    let right_column =
        (region.left + region.width + MAX_TILE_EXTENT_LEFT - 1).div_euclid(TILE_PIXELS);
    // neighbouring rows overlap by half a tile
    let mut row = (upper_left.x + upper_left.y).div_euclid(TILE_SIZE) - 2;

    let potential_bridge_height = TILE_HEIGHT * max_bridge_height;
    let region_bottom = region.top + region.height;

    let mut last_row = false;
    while !last_row {
        // a one-column window has no tile on every other row
        last_row = left_column < right_column || (row + left_column) & 1 == 0;
        for column in left_column..=right_column {
            if (row + column) & 1 != 0 {
                continue;
            }
            let tx = (row - column) / 2;
            let ty = (row + column) / 2;
            debug_assert_eq!(column, ty - tx);

            let vy = viewport_y(map, tx, ty);
            if vy + MAX_TILE_EXTENT_BOTTOM <= region.top {
                // more rows needed whatever happens in other columns
                last_row = false;
                continue;
            }

            let kind = map.tile_kind(tx, ty);
            let min_visible_height = vy - region_bottom;
            let mut tile_visible = min_visible_height <= 0;

            if kind != TileKind::Void {
                if min_visible_height < MAX_TILE_EXTENT_TOP {
                    tile_visible = true;
                }
                if let Some(level) = map.bridge_height(tx, ty) {
                    let bridge = level * TILE_HEIGHT - map.tile_pixel_height_outside_map(tx, ty);
                    if min_visible_height < bridge + MAX_TILE_EXTENT_TOP {
                        tile_visible = true;
                    }
                }
                if min_visible_height < potential_bridge_height + MAX_TILE_EXTENT_TOP {
                    last_row = false;
                }
            } else if (tx <= 0 || ty <= 0)
                && min_visible_height < potential_bridge_height + MAX_TILE_EXTENT_TOP
            {
                // north border: a bridge on the map may still rise into view
                last_row = false;
            }

            if !tile_visible {
                continue;
            }
            last_row = false;
            visit(map.tile_info(ivec2(tx, ty)));
        }
        row += 1;
    }
}

/// Draw every visible tile of the collector's region through `drawer`.
///
/// Foundation state is reset before each tile.
pub fn add_landscape(
    vd: &mut SpriteCollector<'_>,
    map: &impl TileMap,
    drawer: &dyn TileDrawer,
    max_bridge_height: i32,
) {
    let region = *vd.region();
    let mut visited = 0usize;
    for_each_visible_tile(map, &region, max_bridge_height, |ti| {
        vd.begin_tile(ti);
        drawer.draw_tile(&ti, vd);
        visited += 1;
    });
    vd.end_tiles();
    log::trace!("landscape: {visited} tiles for {:?}", region.virtual_rect());
}

/*──────────────────────────────── Tests ───────────────────────────────*/
