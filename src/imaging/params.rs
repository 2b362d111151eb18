//! Parameter types for image operations.
//!
//! These describe *how* a resize or transform should happen. They are the
//! interface between the pure [`calculations`](super::calculations) (which decide
//! targets and filters) and the [`Codec`](super::Codec) that does the pixel
//! work, so a mock codec can record them without touching pixels.
//!
//! ## Types
//!
//! - [`Viewport`]: the screen area bitmaps are fitted to. Clamped to ≥1 on construction.
//! - [`Interpolation`]: resampling policy picked per resize.
//! - [`JpegScale`]: DCT-domain reduction ratio for the fast JPEG path.
//! - [`Rotation`]: one of four quarter-turn orientations.
//! - [`ZoomTuning`]: growth curve and size limit for zoom levels.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the display area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn dimensions(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Resampling policy.
///
/// | Policy | Used when | `image` filter |
/// |---|---|---|
/// | `Hamming` | shrinking on both axes | `Triangle` |
/// | `Bicubic` | shrinking on one axis | `CatmullRom` |
/// | `Lanczos` | enlarging | `Lanczos3` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Hamming,
    Bicubic,
    Lanczos,
}

impl Interpolation {
    pub fn filter_type(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            Self::Hamming => FilterType::Triangle,
            Self::Bicubic => FilterType::CatmullRom,
            Self::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Reduction ratio for a DCT-scaled JPEG decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegScale {
    Half,
    Quarter,
}

impl JpegScale {
    /// `(numerator, denominator)` of the scale.
    pub fn ratio(self) -> (u32, u32) {
        match self {
            Self::Half => (1, 2),
            Self::Quarter => (1, 4),
        }
    }

    /// Scaled size of one axis, rounded up like libjpeg does.
    pub fn apply(self, dimension: u32) -> u32 {
        let (_, den) = self.ratio();
        dimension.div_ceil(den).max(1)
    }
}

/// Clockwise orientation of the displayed bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Orientation for any multiple of 90, wrapping; `None` otherwise.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Self::Deg0,
            90 => Self::Deg90,
            180 => Self::Deg180,
            _ => Self::Deg270,
        })
    }

    pub fn clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    pub fn counter_clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg270,
            Self::Deg90 => Self::Deg0,
            Self::Deg180 => Self::Deg90,
            Self::Deg270 => Self::Deg180,
        }
    }
}

/// Growth curve and limits for zoom levels.
///
/// - `growth`: size multiplier per level.
/// - `aspect_divisor`: extreme width:height ratios zoom faster; the integer
///   ratio is divided by this and added to the base factor of 1.
/// - `max_dimension`: largest permitted axis of a zoomed bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTuning {
    pub growth: f64,
    pub aspect_divisor: u32,
    pub max_dimension: u32,
}

impl Default for ZoomTuning {
    fn default() -> Self {
        Self {
            growth: 1.4,
            aspect_divisor: 6,
            max_dimension: 65_535,
        }
    }
}
