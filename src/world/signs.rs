//! Viewport signs and their spatial index.
//!
//! * A sign is anchored at the virtual point `(center, top)`; its frame is
//!   laid out around that point at draw time, so the on-screen size depends
//!   on the zoom level.
//! * [`SignIndex`] buckets anchors into a sparse grid of `SmallVec` cells.
//!   Queries take a virtual rectangle that has already been widened by the
//!   largest possible sign (see [`SignIndex::expand_with_margins`]).

use bitflags::bitflags;
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::{
    engine::{
        sprites::SpriteCollector,
        types::Rect,
        zoom::{ZoomLevel, scale_by_zoom},
    },
    renderer::{Rgba, font_height, text_width},
};

/* frame margins around the text, screen pixels */
pub const VPSM_LEFT: i32 = 1;
pub const VPSM_RIGHT: i32 = 1;
pub const VPSM_TOP: i32 = 1;
pub const VPSM_BOTTOM: i32 = 1;

/// From this zoom level on signs use the small font.
pub const SMALL_SIGN_ZOOM: ZoomLevel = ZoomLevel::Out16x;

/// Offset of the drop shadow behind small town names, virtual pixels.
const SHADOW_OFFSET: i32 = 4;

const TEXT_WHITE: Rgba = 0xFF_FF_FF_FF;
const TEXT_BLACK: Rgba = 0xFF_00_00_00;

/*──────────────────────── core types ────────────────────────*/

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignKind {
    Town,
    Station,
    Waypoint,
    Sign,
}

bitflags! {
    /// Which kinds of signs a pass draws.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SignLayers: u8 {
        const TOWNS     = 1 << 0;
        const STATIONS  = 1 << 1;
        const WAYPOINTS = 1 << 2;
        const SIGNS     = 1 << 3;
    }
}

impl SignLayers {
    fn shows(self, kind: SignKind) -> bool {
        match kind {
            SignKind::Town => self.contains(Self::TOWNS),
            SignKind::Station => self.contains(Self::STATIONS),
            SignKind::Waypoint => self.contains(Self::WAYPOINTS),
            SignKind::Sign => self.contains(Self::SIGNS),
        }
    }
}

/// Placement and measured widths of one sign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportSign {
    /// Virtual x of the horizontal centre.
    pub center: i32,
    /// Virtual y of the top edge.
    pub top: i32,
    /// Frame widths in screen pixels, normal and small font.
    pub width_normal: u16,
    pub width_small: u16,
}

/// Frame width for `text`: margins plus the text rounded up to even.
fn frame_width(text: &str, small: bool) -> u16 {
    let w = text_width(text, small);
    (VPSM_LEFT + ((w + 1) & !1) + VPSM_RIGHT) as u16
}

impl ViewportSign {
    /// Measure `text` (and `small_text`, defaulting to `text`) at `(center, top)`.
    pub fn new(center: i32, top: i32, text: &str, small_text: Option<&str>) -> Self {
        Self {
            center,
            top,
            width_normal: frame_width(text, false),
            width_small: frame_width(small_text.unwrap_or(text), true),
        }
    }

    fn width_at(&self, zoom: ZoomLevel) -> u16 {
        if zoom >= SMALL_SIGN_ZOOM { self.width_small } else { self.width_normal }
    }

    /// Virtual frame height; the normal font is assumed at every zoom.
    fn height_at(zoom: ZoomLevel) -> i32 {
        scale_by_zoom(VPSM_TOP + font_height(false) + VPSM_BOTTOM, zoom)
    }

    /// Coarse test against a virtual rectangle, edges inclusive.
    pub fn touches(&self, r: &Rect, zoom: ZoomLevel) -> bool {
        let half = scale_by_zoom(self.width_at(zoom) as i32 / 2, zoom);
        !(r.bottom < self.top
            || r.top > self.top + Self::height_at(zoom)
            || r.right < self.center - half
            || r.left > self.center + half)
    }

    /// Does virtual point `(x, y)` hit the frame at `zoom`?
    pub fn hit(&self, x: i32, y: i32, zoom: ZoomLevel) -> bool {
        let small = zoom >= SMALL_SIGN_ZOOM;
        let half = scale_by_zoom(self.width_at(zoom) as i32 / 2, zoom);
        let h = scale_by_zoom(VPSM_TOP + font_height(small) + VPSM_BOTTOM, zoom);
        y >= self.top && y < self.top + h && x >= self.center - half && x < self.center + half
    }

    /// Virtual rectangle to repaint for this sign at `zoom`.
    pub fn dirty_rect(&self, zoom: ZoomLevel) -> Rect {
        let half = scale_by_zoom(self.width_normal as i32 / 2 + 1, zoom);
        Rect::new(
            self.center - half,
            self.top - scale_by_zoom(1, zoom),
            self.center + half,
            self.top + scale_by_zoom(VPSM_TOP + font_height(false) + VPSM_BOTTOM + 1, zoom),
        )
    }
}

/// Handle into a [`SignIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignId(pub u32);

#[derive(Clone, Debug)]
pub struct SignEntry {
    pub kind: SignKind,
    pub sign: ViewportSign,
    pub text: String,
    pub small_text: Option<String>,
    /// Frame colour; `None` draws bare text.
    pub colour: Option<Rgba>,
}

/*───────────────────────── grid ─────────────────────────────*/

/// Grid cell edge in virtual pixels.
const CELL: i32 = 256;

type Cell = SmallVec<[SignId; 8]>;

#[inline]
fn cell_of(v: i32) -> i32 {
    v.div_euclid(CELL)
}

/// Sparse grid over sign anchors.
#[derive(Default)]
pub struct SignIndex {
    cells: HashMap<(i32, i32), Cell>,
    entries: Vec<Option<SignEntry>>,
    /// Widest `width_normal` seen; only grows.
    max_width: i32,
}

impl SignIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: SignId) -> Option<&SignEntry> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    fn link(&mut self, id: SignId, sign: &ViewportSign) {
        self.max_width = self.max_width.max(sign.width_normal as i32);
        self.cells
            .entry((cell_of(sign.center), cell_of(sign.top)))
            .or_default()
            .push(id);
    }

    fn unlink(&mut self, id: SignId, sign: &ViewportSign) {
        let key = (cell_of(sign.center), cell_of(sign.top));
        if let Some(cell) = self.cells.get_mut(&key) {
            if let Some(i) = cell.iter().position(|&s| s == id) {
                cell.remove(i);
            }
            if cell.is_empty() {
                self.cells.remove(&key);
            }
        }
    }

    /// Add a sign; the returned id stays valid until [`remove`](Self::remove).
    pub fn insert(
        &mut self,
        kind: SignKind,
        center: i32,
        top: i32,
        text: impl Into<String>,
        colour: Option<Rgba>,
    ) -> SignId {
        let text = text.into();
        let sign = ViewportSign::new(center, top, &text, None);
        let id = SignId(self.entries.len() as u32);
        self.link(id, &sign);
        self.entries.push(Some(SignEntry {
            kind,
            sign,
            text,
            small_text: None,
            colour,
        }));
        id
    }

    /// Move and re-measure a sign. Returns its old placement so the caller
    /// can invalidate both footprints.
    pub fn update(
        &mut self,
        id: SignId,
        center: i32,
        top: i32,
        text: impl Into<String>,
        small_text: Option<String>,
    ) -> Option<ViewportSign> {
        let old = self.get(id)?.sign;
        self.unlink(id, &old);

        let text = text.into();
        let sign = ViewportSign::new(center, top, &text, small_text.as_deref());
        self.link(id, &sign);

        let entry = self.entries[id.0 as usize].as_mut()?;
        entry.sign = sign;
        entry.text = text;
        entry.small_text = small_text;
        Some(old)
    }

    pub fn remove(&mut self, id: SignId) -> Option<SignEntry> {
        let entry = self.entries.get_mut(id.0 as usize)?.take()?;
        self.unlink(id, &entry.sign);
        Some(entry)
    }

    /// Widen a virtual rectangle by the largest sign that may overlap it.
    pub fn expand_with_margins(&self, r: Rect, zoom: ZoomLevel) -> Rect {
        let expand_y = scale_by_zoom(VPSM_TOP + font_height(false) + VPSM_BOTTOM, zoom);
        let expand_x = scale_by_zoom(VPSM_LEFT + self.max_width / 2 + 1 + VPSM_RIGHT, zoom);
        r.expand(expand_x, expand_y)
    }

    /// Visit every sign whose anchor lies in `r`, edges inclusive.
    /// Iteration stops early when `f` returns `false`.
    pub fn for_each_in_rect<'a, F>(&'a self, r: &Rect, mut f: F) -> bool
    where
        F: FnMut(SignId, &'a SignEntry) -> bool,
    {
        for cy in cell_of(r.top)..=cell_of(r.bottom) {
            for cx in cell_of(r.left)..=cell_of(r.right) {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &id in cell {
                    let Some(e) = self.get(id) else {
                        continue;
                    };
                    let s = &e.sign;
                    if s.center < r.left || s.center > r.right || s.top < r.top || s.top > r.bottom {
                        continue;
                    }
                    if !f(id, e) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Top-most visible sign under virtual point `(x, y)`.
    ///
    /// Stations and waypoints win over towns, towns over plain signs;
    /// within a kind the last match wins.
    pub fn sign_hit(&self, x: i32, y: i32, zoom: ZoomLevel, layers: SignLayers) -> Option<SignId> {
        let hit_area = self.expand_with_margins(Rect::new(x - 1, y - 1, x + 1, y + 1), zoom);
        let (mut station, mut town, mut sign) = (None, None, None);
        self.for_each_in_rect(&hit_area, |id, e| {
            if layers.shows(e.kind) && e.sign.hit(x, y, zoom) {
                match e.kind {
                    SignKind::Station | SignKind::Waypoint => station = Some(id),
                    SignKind::Town => town = Some(id),
                    SignKind::Sign => sign = Some(id),
                }
            }
            true
        });
        station.or(town).or(sign)
    }
}

/*──────────────────────── drawing ───────────────────────────*/

/// Queue one sign's text if its frame can reach the collector's region.
fn add_viewport_string(vd: &mut SpriteCollector<'_>, e: &SignEntry) {
    let region = *vd.region();
    let zoom = region.zoom;
    let s = &e.sign;
    if !s.touches(&region.virtual_rect(), zoom) {
        return;
    }

    let half = scale_by_zoom(s.width_at(zoom) as i32 / 2, zoom);
    let left = s.center - half;
    if zoom < SMALL_SIGN_ZOOM {
        vd.add_string(left, s.top, e.text.as_str(), e.colour, TEXT_WHITE, s.width_normal, false);
        return;
    }

    let text = e.small_text.as_deref().unwrap_or(&e.text);
    let mut shadow = 0;
    if e.kind == SignKind::Town {
        shadow = SHADOW_OFFSET;
        vd.add_string(left + shadow, s.top, text, None, TEXT_BLACK, s.width_small, true);
    }
    let text_colour = if e.colour.is_some() || e.kind == SignKind::Town { TEXT_WHITE } else { TEXT_BLACK };
    vd.add_string(left, s.top - shadow, text, e.colour, text_colour, s.width_small, true);
}

/// Add all visible sign texts of `layers` to the pass.
///
/// Layering from bottom to top: towns, signs, stations and waypoints.
pub fn add_signs(vd: &mut SpriteCollector<'_>, index: &SignIndex, layers: SignLayers) {
    let region = *vd.region();
    let search = index.expand_with_margins(region.virtual_rect(), region.zoom);

    let mut towns: SmallVec<[&SignEntry; 16]> = SmallVec::new();
    let mut signs: SmallVec<[&SignEntry; 16]> = SmallVec::new();
    let mut stations: SmallVec<[&SignEntry; 16]> = SmallVec::new();
    index.for_each_in_rect(&search, |_, e| {
        if layers.shows(e.kind) {
            match e.kind {
                SignKind::Town => towns.push(e),
                SignKind::Sign => signs.push(e),
                SignKind::Station | SignKind::Waypoint => stations.push(e),
            }
        }
        true
    });

    for e in towns.iter().chain(&signs).chain(&stations) {
        add_viewport_string(vd, e);
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
