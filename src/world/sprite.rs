// Format-agnostic sprite table filled by whatever loads the artwork.
// The engine only ever hands around `SpriteId`s; pixels are read at blit time.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

/// Runtime handle for a sprite in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type SpriteId = u32;

/// Checkerboard fallback. Always = 0 because `SpriteBank::new()` inserts it first.
pub const NO_SPRITE: SpriteId = 0;

/// Reserved id: bounding box only, nothing to blit.
pub const SPR_EMPTY_BOUNDING_BOX: SpriteId = SpriteId::MAX;

/// Index of the recolour table used for transparent sprites.
pub const PALETTE_TO_TRANSPARENT: u16 = 0;

/// Palette-indexed image with its draw anchor.
///
/// `x_offs/y_offs` is where the top-left pixel goes relative to the point
/// the sprite is drawn at. Index `0` is transparent.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    pub name: String,
    pub x_offs: i16,
    pub y_offs: i16,
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
}

impl Sprite {
    /// Solid rectangle of one palette index.
    pub fn solid(name: impl Into<String>, x_offs: i16, y_offs: i16, w: u16, h: u16, colour: u8) -> Self {
        Sprite {
            name: name.into(),
            x_offs,
            y_offs,
            width: w,
            height: h,
            pixels: vec![colour; w as usize * h as usize],
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width as usize + x]
    }
}

/// Convenience checkerboard 8×8 anchored at its centre.
impl Default for Sprite {
    fn default() -> Self {
        const LIGHT_IDX: u8 = 8;
        const DARK_IDX: u8 = 16;
        let mut pix = vec![0u8; 8 * 8];
        for y in 0..8 {
            for x in 0..8 {
                pix[y * 8 + x] = if (x ^ y) & 1 == 0 { LIGHT_IDX } else { DARK_IDX };
            }
        }
        Sprite {
            name: "CHECKER".to_string(),
            x_offs: -4,
            y_offs: -4,
            width: 8,
            height: 8,
            pixels: pix,
        }
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpriteError {
    /// Attempted to insert a second sprite with an existing name.
    #[error("sprite name `{0}` already present in bank")]
    Duplicate(String),

    /// Requested ID is outside `0 .. bank.len()`.
    #[error("sprite id {0} out of range")]
    BadId(SpriteId),

    #[error("recolour table {0} out of range")]
    BadRecolour(u16),
}

/// 256 × 0xAARRGGBB.
#[derive(Clone)]
pub struct Palette(pub [u32; 256]);

impl Default for Palette {
    /// Grey ramp.
    fn default() -> Self {
        let mut p = [0u32; 256];
        for (i, c) in p.iter_mut().enumerate() {
            let v = i as u32;
            *c = 0xFF00_0000 | (v << 16) | (v << 8) | v;
        }
        Palette(p)
    }
}

impl Index<u8> for Palette {
    type Output = u32;
    fn index(&self, idx: u8) -> &u32 {
        &self.0[idx as usize]
    }
}

impl IndexMut<u8> for Palette {
    fn index_mut(&mut self, idx: u8) -> &mut u32 {
        &mut self.0[idx as usize]
    }
}

/// Palette-index substitution table (company colours, transparency, ...).
#[derive(Clone)]
pub struct Recolour(pub [u8; 256]);

impl Recolour {
    pub fn identity() -> Self {
        let mut t = [0u8; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = i as u8;
        }
        Recolour(t)
    }
}

impl Index<u8> for Recolour {
    type Output = u8;
    fn index(&self, idx: u8) -> &u8 {
        &self.0[idx as usize]
    }
}

/// A palette-indexed cache of sprites.
///
/// * Stores exactly one copy of every name.
/// * ID **0** is always the "missing" checkerboard.
/// * Recolour table [`PALETTE_TO_TRANSPARENT`] always exists.
pub struct SpriteBank {
    by_name: HashMap<String, SpriteId>,
    data: Vec<Sprite>,
    palette: Palette,
    recolours: Vec<Recolour>,
}

impl SpriteBank {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    /// Create an empty bank with a mandatory *missing* sprite under the fixed
    /// name `"MISSING"`; it obtains the handle **0**.
    pub fn new(missing: Sprite) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".into(), NO_SPRITE);
        Self {
            by_name,
            data: vec![missing],
            palette: Palette::default(),
            recolours: vec![Recolour::identity()],
        }
    }

    pub fn default_with_checker() -> Self {
        Self::new(Sprite::default())
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Replace the transparency table.
    pub fn set_transparent_table(&mut self, table: Recolour) {
        self.recolours[PALETTE_TO_TRANSPARENT as usize] = table;
    }

    /// Register a recolour table; returns its index.
    pub fn add_recolour(&mut self, table: Recolour) -> u16 {
        self.recolours.push(table);
        (self.recolours.len() - 1) as u16
    }

    pub fn recolour(&self, idx: u16) -> Result<&Recolour, SpriteError> {
        self.recolours
            .get(idx as usize)
            .ok_or(SpriteError::BadRecolour(idx))
    }

    // ---------------------------------------------------------------------
    // Query helpers
    // ---------------------------------------------------------------------

    /// Number of sprites stored (including the "missing" one).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    } // only checker

    /// Id for a loaded sprite by name, `None` if unknown.
    pub fn id(&self, name: &str) -> Option<SpriteId> {
        self.by_name.get(name).copied()
    }

    /// Fallback-safe query: unknown names resolve to the checkerboard id.
    pub fn id_or_missing(&self, name: &str) -> SpriteId {
        self.id(name).unwrap_or(NO_SPRITE)
    }

    /// `true` if `id` can be drawn; [`SPR_EMPTY_BOUNDING_BOX`] counts.
    pub fn is_valid(&self, id: SpriteId) -> bool {
        id == SPR_EMPTY_BOUNDING_BOX || (id as usize) < self.data.len()
    }

    /// Borrow a sprite by id, with bounds-checking.
    pub fn sprite(&self, id: SpriteId) -> Result<&Sprite, SpriteError> {
        self.data.get(id as usize).ok_or(SpriteError::BadId(id))
    }

    /// Borrow a sprite, substituting the checkerboard for bad ids.
    pub fn sprite_or_missing(&self, id: SpriteId) -> &Sprite {
        self.data.get(id as usize).unwrap_or(&self.data[NO_SPRITE as usize])
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Insert a sprite under its own name; fails on `Duplicate`.
    pub fn insert(&mut self, sprite: Sprite) -> Result<SpriteId, SpriteError> {
        if self.by_name.contains_key(&sprite.name) {
            return Err(SpriteError::Duplicate(sprite.name));
        }
        let id = self.data.len() as SpriteId;
        self.by_name.insert(sprite.name.clone(), id);
        self.data.push(sprite);
        Ok(id)
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
