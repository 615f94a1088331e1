//! Zoom levels and the power-of-two scaling between virtual and screen pixels.
//!
//! Every virtual coordinate is expressed at [`ZoomLevel::Normal`]. Going down
//! to screen pixels **always floors** (arithmetic shift), for negative values
//! too. Scroll offsets and the draw origin both go through
//! [`unscale_by_zoom`], so they can never disagree by a pixel.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomLevel {
    #[default]
    Normal = 0,
    Out2x = 1,
    Out4x = 2,
    Out8x = 3,
    Out16x = 4,
    Out32x = 5,
}

impl ZoomLevel {
    pub const MIN: ZoomLevel = ZoomLevel::Normal;
    pub const MAX: ZoomLevel = ZoomLevel::Out32x;

    pub const ALL: [ZoomLevel; 6] = [
        ZoomLevel::Normal,
        ZoomLevel::Out2x,
        ZoomLevel::Out4x,
        ZoomLevel::Out8x,
        ZoomLevel::Out16x,
        ZoomLevel::Out32x,
    ];

    /// log2 of the virtual-pixels-per-screen-pixel factor.
    #[inline(always)]
    pub fn shift(self) -> u32 {
        self as u32
    }

    pub fn from_shift(shift: u32) -> Option<Self> {
        Self::ALL.get(shift as usize).copied()
    }

    /// One step closer to the ground, or `None` at the minimum.
    pub fn zoomed_in(self) -> Option<Self> {
        self.shift().checked_sub(1).and_then(Self::from_shift)
    }

    /// One step further away, or `None` at the maximum.
    pub fn zoomed_out(self) -> Option<Self> {
        Self::from_shift(self.shift() + 1)
    }

    pub fn clamp_to(self, min: ZoomLevel, max: ZoomLevel) -> Self {
        self.max(min).min(max)
    }
}

/// Screen pixels → virtual pixels.
#[inline(always)]
pub fn scale_by_zoom(value: i32, zoom: ZoomLevel) -> i32 {
    value << zoom.shift()
}

/// Virtual pixels → screen pixels, rounding towards negative infinity.
#[inline(always)]
pub fn unscale_by_zoom(value: i32, zoom: ZoomLevel) -> i32 {
    value >> zoom.shift()
}

/// Virtual pixels → screen pixels, rounding towards positive infinity.
///
/// Only for exclusive right/bottom edges that must grow outwards.
#[inline(always)]
pub fn unscale_by_zoom_ceil(value: i32, zoom: ZoomLevel) -> i32 {
    let s = zoom.shift();
    (value >> s) + i32::from(value & ((1 << s) - 1) != 0)
}

/// Mask aligning a virtual coordinate down to a whole screen pixel.
#[inline(always)]
pub fn zoom_mask(zoom: ZoomLevel) -> i32 {
    scale_by_zoom(-1, zoom)
}
