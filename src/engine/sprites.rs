//! Per-pass sprite accumulation.
//!
//! A [`SpriteCollector`] is the render context handed to every tile and
//! object drawer during one compositing pass. It owns nothing long-lived:
//! the backing [`SpriteBuffers`] are borrowed from the compositor and wiped
//! when the pass ends.
//!
//! ```text
//!  tiles     ground sprites, drawn first, in traversal order
//!  parents   sprites with a 3-D box, depth sorted
//!  children  per-parent lists, linked by index (`next`, -1 = end)
//!  strings   sign texts, drawn last
//! ```
//!
//! Child lists are intrusive: a parent stores the index of its first child
//! and every child the index of the next one. Links are plain integers so the
//! vectors may reallocate freely while a pass is running.

use glam::{IVec2, IVec3, ivec2};

use crate::{
    engine::types::DrawRegion,
    engine::projection::remap_coords,
    renderer::{PaletteMode, Rgba, SubSprite},
    world::{
        map::TileInfo,
        sprite::{SPR_EMPTY_BOUNDING_BOX, SpriteBank, SpriteId},
    },
};

/// Terminator of a child list.
pub const NO_CHILD: i32 = -1;

/// Virtual pixels per sprite pixel at the closest zoom level.
pub const ZOOM_BASE: i32 = 1;

/*──────────────────────────── draw records ────────────────────────────*/

/// Unsorted ground sprite at an absolute virtual position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSpriteToDraw {
    pub image: SpriteId,
    pub pal: PaletteMode,
    pub sub: Option<SubSprite>,
    pub x: i32,
    pub y: i32,
}

/// Inclusive axis-aligned world box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WorldBox {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
    pub zmin: i32,
    pub zmax: i32,
}

impl WorldBox {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        Self {
            xmin: min.x,
            xmax: max.x,
            ymin: min.y,
            ymax: max.y,
            zmin: min.z,
            zmax: max.z,
        }
    }

    /// Boxes share at least one point on all three axes.
    #[inline]
    pub fn overlaps(&self, o: &WorldBox) -> bool {
        self.xmin <= o.xmax
            && o.xmin <= self.xmax
            && self.ymin <= o.ymax
            && o.ymin <= self.ymax
            && self.zmin <= o.zmax
            && o.zmin <= self.zmax
    }

    /// Sum of all six bounds; tie-breaker between overlapping boxes.
    #[inline]
    pub fn bound_sum(&self) -> i64 {
        self.xmin as i64
            + self.xmax as i64
            + self.ymin as i64
            + self.ymax as i64
            + self.zmin as i64
            + self.zmax as i64
    }
}

impl AsRef<WorldBox> for WorldBox {
    fn as_ref(&self) -> &WorldBox {
        self
    }
}

/// Depth-sorted sprite with its world box and child list head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentSpriteToDraw {
    pub image: SpriteId,
    pub pal: PaletteMode,
    pub sub: Option<SubSprite>,
    /// Anchor the image is drawn at.
    pub x: i32,
    pub y: i32,
    /// Top-left of the image (or of the box for [`SPR_EMPTY_BOUNDING_BOX`]);
    /// children are positioned relative to it.
    pub left: i32,
    pub top: i32,
    pub bbox: WorldBox,
    pub first_child: i32,
}

impl AsRef<WorldBox> for ParentSpriteToDraw {
    fn as_ref(&self) -> &WorldBox {
        &self.bbox
    }
}

/// Sprite attached to a parent, offset from the parent's `left/top`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildScreenSpriteToDraw {
    pub image: SpriteId,
    pub pal: PaletteMode,
    pub sub: Option<SubSprite>,
    pub x: i32,
    pub y: i32,
    pub next: i32,
}

/// Sign text with an optional background frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringSpriteToDraw {
    pub text: String,
    /// Virtual position of the frame's top-left.
    pub x: i32,
    pub y: i32,
    /// `None` draws the bare text without a frame.
    pub colour: Option<Rgba>,
    pub text_colour: Rgba,
    /// Frame width in screen pixels.
    pub width: u16,
    pub small: bool,
}

/// Bounding box of a sortable sprite relative to its world position.
///
/// The box spans `pos + offset ..= pos + max(offset, extent) - 1` on every
/// axis; `offset == extent` gives a one unit thick slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteBounds {
    pub extent: IVec3,
    pub offset: IVec3,
}

impl SpriteBounds {
    pub fn new(w: i32, h: i32, dz: i32) -> Self {
        Self {
            extent: IVec3::new(w, h, dz),
            offset: IVec3::ZERO,
        }
    }

    pub fn with_offset(mut self, x: i32, y: i32, z: i32) -> Self {
        self.offset = IVec3::new(x, y, z);
        self
    }
}

/// All buffers of one pass. Reused across passes to keep capacity.
#[derive(Default, Debug)]
pub struct SpriteBuffers {
    pub tiles: Vec<TileSpriteToDraw>,
    pub parents: Vec<ParentSpriteToDraw>,
    pub children: Vec<ChildScreenSpriteToDraw>,
    pub strings: Vec<StringSpriteToDraw>,
}

impl SpriteBuffers {
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.parents.clear();
        self.children.clear();
        self.strings.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
            && self.parents.is_empty()
            && self.children.is_empty()
            && self.strings.is_empty()
    }

    /// Iterate the child list of `parents[idx]` in draw order.
    pub fn children_of(&self, idx: usize) -> ChildIter<'_> {
        ChildIter {
            children: &self.children,
            next: self.parents[idx].first_child,
        }
    }
}

pub struct ChildIter<'a> {
    children: &'a [ChildScreenSpriteToDraw],
    next: i32,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a ChildScreenSpriteToDraw;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < 0 {
            return None;
        }
        let cs = &self.children[self.next as usize];
        self.next = cs.next;
        Some(cs)
    }
}

/*──────────────────────────── emission state ──────────────────────────*/

/// Sprite-combine state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CombineMode {
    #[default]
    None,
    /// Started; waiting for the first sprite that survives culling.
    Pending,
    /// Later sortable sprites become children of the last parent.
    Active,
}

/// Foundation part of the tile being drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoundationPart {
    Normal = 0,
    HalfTile = 1,
}

/// Slot that receives the index of the next child sprite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChildLink {
    Parent(usize),
    Child(usize),
}

/// Render context passed to drawers during one pass.
pub struct SpriteCollector<'a> {
    bank: &'a SpriteBank,
    buf: &'a mut SpriteBuffers,
    region: DrawRegion,
    draw_bounding_boxes: bool,

    combine: CombineMode,
    /// `None` when the last parent was culled; children then no-op.
    last_child: Option<ChildLink>,

    cur_tile: Option<TileInfo>,
    foundation_part: Option<FoundationPart>,
    foundation: [Option<usize>; 2],
    foundation_offset: [IVec2; 2],
    last_foundation_child: [Option<ChildLink>; 2],
}

impl<'a> SpriteCollector<'a> {
    pub fn new(
        bank: &'a SpriteBank,
        buf: &'a mut SpriteBuffers,
        region: DrawRegion,
        draw_bounding_boxes: bool,
    ) -> Self {
        debug_assert!(buf.is_empty(), "sprite buffers not cleared after last pass");
        Self {
            bank,
            buf,
            region,
            draw_bounding_boxes,
            combine: CombineMode::None,
            last_child: None,
            cur_tile: None,
            foundation_part: None,
            foundation: [None; 2],
            foundation_offset: [IVec2::ZERO; 2],
            last_foundation_child: [None; 2],
        }
    }

    #[inline]
    pub fn region(&self) -> &DrawRegion {
        &self.region
    }

    #[inline]
    pub fn bank(&self) -> &SpriteBank {
        self.bank
    }

    pub fn buffers(&self) -> &SpriteBuffers {
        self.buf
    }

    pub fn combine_mode(&self) -> CombineMode {
        self.combine
    }

    pub fn current_tile(&self) -> Option<&TileInfo> {
        self.cur_tile.as_ref()
    }

    /// Enter a new tile: forget the previous tile's foundations.
    pub fn begin_tile(&mut self, ti: TileInfo) {
        self.cur_tile = Some(ti);
        self.foundation_part = None;
        self.foundation = [None; 2];
        self.last_foundation_child = [None; 2];
    }

    /// Leave tile context, e.g. before drawing vehicles or signs.
    pub fn end_tiles(&mut self) {
        self.cur_tile = None;
        self.foundation_part = None;
        self.foundation = [None; 2];
        self.last_foundation_child = [None; 2];
    }

    fn check_image(&self, image: SpriteId) {
        debug_assert!(self.bank.is_valid(image), "sprite {image} out of range");
    }

    fn child_slot(&mut self, link: ChildLink) -> &mut i32 {
        match link {
            ChildLink::Parent(i) => &mut self.buf.parents[i].first_child,
            ChildLink::Child(i) => &mut self.buf.children[i].next,
        }
    }

    /*────────────────────────── ground sprites ───────────────────────────*/

    /// Append a ground sprite at world `(x, y, z)` plus a pixel offset.
    #[allow(clippy::too_many_arguments)]
    pub fn add_tile_sprite(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        x: i32,
        y: i32,
        z: i32,
        sub: Option<SubSprite>,
        extra_offs: IVec2,
    ) {
        self.check_image(image);
        let pt = remap_coords(x, y, z);
        self.buf.tiles.push(TileSpriteToDraw {
            image,
            pal,
            sub,
            x: pt.x + extra_offs.x,
            y: pt.y + extra_offs.y,
        });
    }

    /// Attach a sprite to the foundation of `part`.
    ///
    /// The screen offset from the foundation's top-left is the one given to
    /// [`offset_ground_sprite`](Self::offset_ground_sprite) plus `extra_offs`.
    /// No-op when that part has no visible foundation.
    pub fn add_child_sprite_to_foundation(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        sub: Option<SubSprite>,
        part: FoundationPart,
        extra_offs: IVec2,
    ) {
        let p = part as usize;
        if self.foundation[p].is_none() {
            return;
        }
        let offs = self.foundation_offset[p] + extra_offs;

        let saved = self.last_child;
        self.last_child = self.last_foundation_child[p];
        self.add_child_sprite(image, pal, offs.x, offs.y, false, sub, false);
        self.last_child = saved;
    }

    /// Ground sprite at tile-relative world coordinates.
    ///
    /// Lands on the active foundation if the tile has one, otherwise becomes
    /// a plain tile sprite.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_ground_sprite_at(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        x: i32,
        y: i32,
        z: i32,
        sub: Option<SubSprite>,
        extra_offs: IVec2,
    ) {
        let part = *self.foundation_part.get_or_insert(FoundationPart::Normal);
        let extra = extra_offs * ZOOM_BASE;

        if self.foundation[part as usize].is_some() {
            let pt = remap_coords(x, y, z);
            self.add_child_sprite_to_foundation(image, pal, sub, part, pt + extra);
        } else {
            let ti = self.tile_or_origin();
            self.add_tile_sprite(image, pal, ti.x + x, ti.y + y, ti.z + z, sub, extra);
        }
    }

    /// Ground sprite for the whole current tile.
    pub fn draw_ground_sprite(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        sub: Option<SubSprite>,
        extra_offs: IVec2,
    ) {
        self.draw_ground_sprite_at(image, pal, 0, 0, 0, sub, extra_offs);
    }

    /// A foundation has just been added as the last parent sprite.
    ///
    /// Later ground sprites of this tile attach to it, `(x, y)` pixels from
    /// its top-left. Parts advance NONE → NORMAL → HALF_TILE.
    ///
    /// # Panics
    /// On a third call for the same tile.
    pub fn offset_ground_sprite(&mut self, x: i32, y: i32) {
        let part = match self.foundation_part {
            None => FoundationPart::Normal,
            Some(FoundationPart::Normal) => FoundationPart::HalfTile,
            Some(FoundationPart::HalfTile) => unreachable!("more than two foundation parts"),
        };
        self.foundation_part = Some(part);
        let p = part as usize;

        // last_child is None if the foundation was culled
        if self.last_child.is_some() {
            self.foundation[p] = self.buf.parents.len().checked_sub(1);
        }
        self.foundation_offset[p] = ivec2(x, y) * ZOOM_BASE;
        self.last_foundation_child[p] = self.last_child;
    }

    /// Overlay at ground level of the current tile, e.g. a selection marker.
    ///
    /// `z_offset` only moves the sprite on screen; it does not affect sorting.
    pub fn draw_selection_sprite(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        z_offset: i32,
        part: FoundationPart,
    ) {
        if self.foundation[part as usize].is_none() {
            let ti = self.tile_or_origin();
            self.add_tile_sprite(image, pal, ti.x, ti.y, ti.z + z_offset, None, IVec2::ZERO);
        } else {
            self.add_child_sprite_to_foundation(image, pal, None, part, ivec2(0, -z_offset * ZOOM_BASE));
        }
    }

    fn tile_or_origin(&self) -> TileInfo {
        debug_assert!(self.cur_tile.is_some(), "ground sprite outside a tile");
        self.cur_tile.unwrap_or(TileInfo {
            tile: IVec2::ZERO,
            x: 0,
            y: 0,
            z: 0,
            slope: Default::default(),
            kind: Default::default(),
        })
    }

    /*───────────────────────── sortable sprites ──────────────────────────*/

    /// Child of the last parent at world `(x, y, z)`; used while combining.
    fn add_combined_sprite(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        x: i32,
        y: i32,
        z: i32,
        sub: Option<SubSprite>,
    ) {
        let pt = remap_coords(x, y, z);
        let spr = self.bank.sprite_or_missing(image);
        let left = pt.x + spr.x_offs as i32;
        let top = pt.y + spr.y_offs as i32;
        let r = &self.region;

        if left >= r.left + r.width
            || left + spr.width as i32 <= r.left
            || top >= r.top + r.height
            || top + spr.height as i32 <= r.top
        {
            return;
        }

        let Some(ps) = self.buf.parents.last() else {
            return;
        };
        let (dx, dy) = (pt.x - ps.left, pt.y - ps.top);
        self.add_child_sprite(image, pal, dx, dy, false, sub, false);
    }

    /// Sprite with a world bounding box, subject to depth sorting.
    ///
    /// Culled against the draw region; a culled sprite leaves no child
    /// target, so following [`add_child_sprite`](Self::add_child_sprite)
    /// calls are dropped too. Inside a combine block every sprite after the
    /// first visible one becomes a child of it.
    #[allow(clippy::too_many_arguments)]
    pub fn add_sortable_sprite(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        x: i32,
        y: i32,
        z: i32,
        bounds: SpriteBounds,
        transparent: bool,
        sub: Option<SubSprite>,
    ) {
        self.check_image(image);
        let pal = if transparent { PaletteMode::Transparent } else { pal };

        if self.combine == CombineMode::Active {
            self.add_combined_sprite(image, pal, x, y, z, sub);
            return;
        }

        self.last_child = None;

        let SpriteBounds { extent: e, offset: o } = bounds;
        let pt = remap_coords(x, y, z);

        /* screen corners of the box: left, right, top, bottom */
        let box_left = remap_coords(x + e.x, y + o.y, z + o.z).x;
        let box_right = remap_coords(x + o.x, y + e.y, z + o.z).x + 1;
        let box_top = remap_coords(x + o.x, y + o.y, z + e.z).y;
        let box_bottom = remap_coords(x + e.x, y + e.y, z + o.z).y + 1;

        let (mut left, mut right, mut top, mut bottom);
        let (anchor_left, anchor_top);
        if image == SPR_EMPTY_BOUNDING_BOX {
            (left, right, top, bottom) = (box_left, box_right, box_top, box_bottom);
            (anchor_left, anchor_top) = (box_left, box_top);
        } else {
            let spr = self.bank.sprite_or_missing(image);
            left = pt.x + spr.x_offs as i32;
            top = pt.y + spr.y_offs as i32;
            right = left + spr.width as i32;
            bottom = top + spr.height as i32;
            (anchor_left, anchor_top) = (left, top);

            if self.draw_bounding_boxes {
                left = left.min(box_left);
                right = right.max(box_right);
                top = top.min(box_top);
                bottom = bottom.max(box_bottom);
            }
        }

        let r = &self.region;
        if left >= r.left + r.width || right <= r.left || top >= r.top + r.height || bottom <= r.top {
            return;
        }

        let pos = IVec3::new(x, y, z);
        let bbox = WorldBox::new(pos + o, pos + o.max(e) - IVec3::ONE);

        self.buf.parents.push(ParentSpriteToDraw {
            image,
            pal,
            sub,
            x: pt.x,
            y: pt.y,
            left: anchor_left,
            top: anchor_top,
            bbox,
            first_child: NO_CHILD,
        });
        self.last_child = Some(ChildLink::Parent(self.buf.parents.len() - 1));

        if self.combine == CombineMode::Pending {
            self.combine = CombineMode::Active;
        }
    }

    /// Start merging the following sortable sprites into one box.
    ///
    /// # Panics
    /// If a combine block is already open.
    pub fn start_sprite_combine(&mut self) {
        assert_eq!(self.combine, CombineMode::None, "nested sprite combine");
        self.combine = CombineMode::Pending;
    }

    /// Close the block opened by [`start_sprite_combine`](Self::start_sprite_combine).
    ///
    /// # Panics
    /// If no combine block is open.
    pub fn end_sprite_combine(&mut self) {
        assert_ne!(self.combine, CombineMode::None, "sprite combine not started");
        self.combine = CombineMode::None;
    }

    /// Append to the current child list (parent or foundation).
    ///
    /// `(x, y)` is relative to the parent's top-left; with `scale` the offset
    /// is in sprite pixels and multiplied by [`ZOOM_BASE`]. Silently dropped
    /// when the owning parent was culled.
    #[allow(clippy::too_many_arguments)]
    pub fn add_child_sprite(
        &mut self,
        image: SpriteId,
        pal: PaletteMode,
        x: i32,
        y: i32,
        transparent: bool,
        sub: Option<SubSprite>,
        scale: bool,
    ) {
        self.check_image(image);
        let Some(link) = self.last_child else {
            return;
        };
        let pal = if transparent { PaletteMode::Transparent } else { pal };

        let idx = self.buf.children.len();
        *self.child_slot(link) = idx as i32;

        let k = if scale { ZOOM_BASE } else { 1 };
        self.buf.children.push(ChildScreenSpriteToDraw {
            image,
            pal,
            sub,
            x: x * k,
            y: y * k,
            next: NO_CHILD,
        });

        /* keep foundation list tails in step when appending through them */
        let new_tail = Some(ChildLink::Child(idx));
        for tail in &mut self.last_foundation_child {
            if *tail == self.last_child {
                *tail = new_tail;
            }
        }
        self.last_child = new_tail;
    }

    /*─────────────────────────────── text ────────────────────────────────*/

    /// Queue a sign text; `(x, y)` is the virtual top-left of its frame.
    #[allow(clippy::too_many_arguments)]
    pub fn add_string(
        &mut self,
        x: i32,
        y: i32,
        text: impl Into<String>,
        colour: Option<Rgba>,
        text_colour: Rgba,
        width: u16,
        small: bool,
    ) {
        debug_assert!(width != 0);
        self.buf.strings.push(StringSpriteToDraw {
            text: text.into(),
            x,
            y,
            colour,
            text_colour,
            width,
            small,
        });
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::zoom::ZoomLevel,
        world::{
            map::{Slope, TileKind},
            sprite::Sprite,
        },
    };

    fn bank() -> (SpriteBank, SpriteId, SpriteId) {
        let mut bank = SpriteBank::default_with_checker();
        let ground = bank.insert(Sprite::solid("GROUND", -31, 0, 63, 32, 40)).unwrap();
        let house = bank.insert(Sprite::solid("HOUSE", -8, -24, 16, 24, 60)).unwrap();
        (bank, ground, house)
    }

    fn region(left: i32, top: i32, w: i32, h: i32) -> DrawRegion {
        DrawRegion {
            left,
            top,
            width: w,
            height: h,
            zoom: ZoomLevel::Normal,
            screen_x: 0,
            screen_y: 0,
        }
    }

    fn tile(x: i32, y: i32) -> TileInfo {
        TileInfo {
            tile: ivec2(x, y),
            x: x * 16,
            y: y * 16,
            z: 0,
            slope: Slope::FLAT,
            kind: TileKind::Clear,
        }
    }

    #[test]
    fn culled_parent_drops_children() {
        let (bank, _, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(1000, 1000, 64, 64), false);

        vd.add_sortable_sprite(house, PaletteMode::Normal, 0, 0, 0, SpriteBounds::new(16, 16, 16), false, None);
        vd.add_child_sprite(house, PaletteMode::Normal, 0, 0, false, None, false);

        assert!(vd.buffers().parents.is_empty());
        assert!(vd.buffers().children.is_empty());
    }

    #[test]
    fn children_link_in_order() {
        let (bank, _, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-64, -64, 128, 128), false);

        vd.add_sortable_sprite(house, PaletteMode::Normal, 0, 0, 0, SpriteBounds::new(16, 16, 16), false, None);
        vd.add_child_sprite(house, PaletteMode::Normal, 1, 0, false, None, false);
        vd.add_child_sprite(house, PaletteMode::Normal, 2, 0, true, None, false);

        let b = vd.buffers();
        let xs: Vec<_> = b.children_of(0).map(|c| (c.x, c.pal)).collect();
        assert_eq!(xs, vec![(1, PaletteMode::Normal), (2, PaletteMode::Transparent)]);
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let (bank, _, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-64, -64, 128, 128), false);

        let bounds = SpriteBounds::new(16, 16, 8).with_offset(2, 3, 0);
        vd.add_sortable_sprite(house, PaletteMode::Normal, 32, 16, 8, bounds, false, None);

        let ps = &vd.buffers().parents[0];
        assert_eq!(
            ps.bbox,
            WorldBox { xmin: 34, xmax: 47, ymin: 19, ymax: 31, zmin: 8, zmax: 15 }
        );
        let pt = remap_coords(32, 16, 8);
        assert_eq!((ps.x, ps.y), (pt.x, pt.y));
        assert_eq!((ps.left, ps.top), (pt.x - 8, pt.y - 24));
    }

    #[test]
    fn combine_merges_into_one_parent() {
        let (bank, _, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-128, -128, 256, 256), false);

        vd.start_sprite_combine();
        assert_eq!(vd.combine_mode(), CombineMode::Pending);
        for i in 0..3 {
            vd.add_sortable_sprite(house, PaletteMode::Normal, i * 4, 0, 0, SpriteBounds::new(16, 16, 16), false, None);
        }
        assert_eq!(vd.combine_mode(), CombineMode::Active);
        vd.end_sprite_combine();

        let b = vd.buffers();
        assert_eq!(b.parents.len(), 1);
        assert_eq!(b.children_of(0).count(), 2);
    }

    #[test]
    fn combine_waits_for_first_visible_sprite() {
        let (bank, _, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-32, -64, 64, 96), false);

        vd.start_sprite_combine();
        // far off to the left: culled, stays pending
        vd.add_sortable_sprite(house, PaletteMode::Normal, 400, 0, 0, SpriteBounds::new(16, 16, 16), false, None);
        assert_eq!(vd.combine_mode(), CombineMode::Pending);
        vd.add_sortable_sprite(house, PaletteMode::Normal, 0, 0, 0, SpriteBounds::new(16, 16, 16), false, None);
        assert_eq!(vd.combine_mode(), CombineMode::Active);
        vd.end_sprite_combine();

        assert_eq!(vd.buffers().parents.len(), 1);
        assert_eq!(vd.buffers().children.len(), 0);
    }

    #[test]
    #[should_panic(expected = "nested sprite combine")]
    fn nested_combine_panics() {
        let (bank, _, _) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(0, 0, 8, 8), false);
        vd.start_sprite_combine();
        vd.start_sprite_combine();
    }

    #[test]
    fn ground_sprites_follow_foundation() {
        let (bank, ground, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-64, -64, 128, 128), false);

        vd.begin_tile(tile(0, 0));
        vd.draw_ground_sprite(ground, PaletteMode::Normal, None, IVec2::ZERO);
        assert_eq!(vd.buffers().tiles.len(), 1);

        // second tile gets a foundation parent
        vd.begin_tile(tile(1, 0));
        vd.add_sortable_sprite(house, PaletteMode::Normal, 16, 0, 0, SpriteBounds::new(16, 16, 7), false, None);
        vd.offset_ground_sprite(0, -8);
        vd.draw_ground_sprite(ground, PaletteMode::Normal, None, IVec2::ZERO);
        vd.draw_selection_sprite(ground, PaletteMode::Normal, 7, FoundationPart::Normal);

        let b = vd.buffers();
        assert_eq!(b.tiles.len(), 1);
        let kids: Vec<_> = b.children_of(0).map(|c| (c.x, c.y)).collect();
        let pt = remap_coords(0, 0, 0);
        assert_eq!(kids, vec![(pt.x, pt.y - 8), (0, -8 - 7)]);
    }

    #[test]
    fn foundation_children_survive_other_parents() {
        let (bank, ground, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-64, -64, 128, 128), false);

        vd.begin_tile(tile(0, 0));
        vd.add_sortable_sprite(house, PaletteMode::Normal, 0, 0, 0, SpriteBounds::new(16, 16, 7), false, None);
        vd.offset_ground_sprite(0, 0);
        // a building on top becomes the current child target
        vd.add_sortable_sprite(house, PaletteMode::Normal, 0, 0, 8, SpriteBounds::new(16, 16, 16), false, None);
        vd.add_child_sprite(house, PaletteMode::Normal, 3, 3, false, None, false);
        vd.draw_ground_sprite(ground, PaletteMode::Normal, None, IVec2::ZERO);

        let b = vd.buffers();
        assert_eq!(b.children_of(0).count(), 1);
        assert_eq!(b.children_of(1).count(), 1);
        assert_eq!(b.children_of(1).next().map(|c| c.x), Some(3));
    }

    #[test]
    fn culled_foundation_keeps_ground_as_tile_sprite() {
        let (bank, ground, house) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(1000, 1000, 16, 16), false);

        vd.begin_tile(tile(0, 0));
        vd.add_sortable_sprite(house, PaletteMode::Normal, 0, 0, 0, SpriteBounds::new(16, 16, 7), false, None);
        vd.offset_ground_sprite(0, 0);
        vd.draw_ground_sprite(ground, PaletteMode::Normal, None, IVec2::ZERO);

        assert!(vd.buffers().parents.is_empty());
        assert_eq!(vd.buffers().tiles.len(), 1);
    }

    #[test]
    #[should_panic(expected = "more than two foundation parts")]
    fn third_foundation_part_panics() {
        let (bank, _, _) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(0, 0, 8, 8), false);
        vd.begin_tile(tile(0, 0));
        vd.offset_ground_sprite(0, 0);
        vd.offset_ground_sprite(0, 0);
        vd.offset_ground_sprite(0, 0);
    }

    #[test]
    fn empty_box_uses_box_extent_for_culling() {
        let (bank, _, _) = bank();
        let mut buf = SpriteBuffers::default();
        let mut vd = SpriteCollector::new(&bank, &mut buf, region(-8, -8, 16, 16), false);

        vd.add_sortable_sprite(SPR_EMPTY_BOUNDING_BOX, PaletteMode::Normal, 0, 0, 0, SpriteBounds::new(4, 4, 4), false, None);
        let ps = vd.buffers().parents[0];
        // top-left of the box: x from the west corner, y from the raised north
        assert_eq!((ps.left, ps.top), (remap_coords(4, 0, 0).x, remap_coords(0, 0, 4).y));
    }
}
