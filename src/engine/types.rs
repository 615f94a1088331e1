use crate::engine::zoom::{ZoomLevel, unscale_by_zoom};

/// World units along one tile edge.
pub const TILE_SIZE: i32 = 16;
/// World units per height level.
pub const TILE_HEIGHT: i32 = 8;
/// Screen width of a flat tile at [`ZoomLevel::Normal`], divided by two.
pub const TILE_PIXELS: i32 = 32;
/// Tallest building sprite above the north corner of its tile.
pub const MAX_BUILDING_PIXELS: i32 = 200;

/* Worst-case pixel extents of everything drawn for one tile, relative to the
 * tile's north corner. Traversal culling and tile invalidation share them. */
pub const MAX_TILE_EXTENT_LEFT: i32 = TILE_PIXELS;
pub const MAX_TILE_EXTENT_RIGHT: i32 = TILE_PIXELS;
pub const MAX_TILE_EXTENT_TOP: i32 = MAX_BUILDING_PIXELS;
/// Worst case is a steep slope raised at the north corner.
pub const MAX_TILE_EXTENT_BOTTOM: i32 = TILE_PIXELS + 2 * TILE_HEIGHT;

/// Half-open axis-aligned rectangle: `left..right` × `top..bottom`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_size(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Overlapping part, `None` when the two do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Smallest rectangle covering both; empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn expand(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left - dx,
            self.top - dy,
            self.right + dx,
            self.bottom + dy,
        )
    }
}

/// Render target of one compositing pass (the "dpi").
///
/// `left/top/width/height` are virtual pixels already aligned to the zoom
/// mask; `screen_x/screen_y` is where `(left, top)` lands on the screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawRegion {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub zoom: ZoomLevel,
    pub screen_x: i32,
    pub screen_y: i32,
}

impl DrawRegion {
    /// Region extent in virtual pixels.
    pub fn virtual_rect(&self) -> Rect {
        Rect::from_size(self.left, self.top, self.width, self.height)
    }

    /// Region extent in screen pixels.
    pub fn screen_rect(&self) -> Rect {
        Rect::from_size(
            self.screen_x,
            self.screen_y,
            unscale_by_zoom(self.width, self.zoom),
            unscale_by_zoom(self.height, self.zoom),
        )
    }

    /// Screen column of a virtual x coordinate inside this region.
    #[inline]
    pub fn to_screen_x(&self, x: i32) -> i32 {
        unscale_by_zoom(x - self.left, self.zoom) + self.screen_x
    }

    /// Screen row of a virtual y coordinate inside this region.
    #[inline]
    pub fn to_screen_y(&self, y: i32) -> i32 {
        unscale_by_zoom(y - self.top, self.zoom) + self.screen_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_intersection_is_half_open() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 20, 10);
        assert!(!a.intersects(&b));
        assert_eq!(a.intersection(&b), None);

        let c = Rect::new(5, 5, 15, 15);
        assert_eq!(a.intersection(&c), Some(Rect::new(5, 5, 10, 10)));
    }

    #[test]
    fn union_skips_empty() {
        let a = Rect::new(0, 0, 0, 0);
        let b = Rect::new(1, 2, 3, 4);
        assert_eq!(a.union(&b), b);
        assert_eq!(b.union(&Rect::new(-1, 0, 2, 8)), Rect::new(-1, 0, 3, 8));
    }

    #[test]
    fn region_maps_to_screen_with_floor() {
        let r = DrawRegion {
            left: -8,
            top: 16,
            width: 64,
            height: 32,
            zoom: ZoomLevel::Out4x,
            screen_x: 100,
            screen_y: 50,
        };
        assert_eq!(r.to_screen_x(-8), 100);
        assert_eq!(r.to_screen_x(-5), 100);
        assert_eq!(r.to_screen_x(-4), 101);
        assert_eq!(r.to_screen_y(15), 49);
        assert_eq!(r.screen_rect(), Rect::new(100, 50, 116, 58));
    }
}
