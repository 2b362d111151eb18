//! Pure calculation functions for fit and zoom geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Dimensions are `(width, height)` tuples throughout.

use super::params::{Interpolation, JpegScale, Viewport, ZoomTuning};

/// Target size and filter for a screen-fit resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitPlan {
    pub width: u32,
    pub height: u32,
    pub interpolation: Interpolation,
}

/// Target size and filter for one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomPlan {
    pub width: u32,
    pub height: u32,
    pub interpolation: Interpolation,
    /// Both axes reached twice the viewport; no deeper level is useful.
    pub hit_max_zoom: bool,
}

/// A zoom level whose bitmap would exceed the codec's per-axis limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oversize {
    pub width: u64,
    pub height: u64,
}

/// Pick a resampling filter by comparing the source against `bounds`.
///
/// Shrinking on both axes uses the cheap decimation filter, shrinking on
/// exactly one uses bicubic, and enlarging uses Lanczos.
///
/// # Examples
/// ```
/// # use fitview::imaging::{choose_interpolation, Interpolation};
/// assert_eq!(choose_interpolation((4000, 3000), (1920, 1080)), Interpolation::Hamming);
/// assert_eq!(choose_interpolation((2000, 800), (1920, 1080)), Interpolation::Bicubic);
/// assert_eq!(choose_interpolation((600, 800), (1920, 1080)), Interpolation::Lanczos);
/// ```
pub fn choose_interpolation(source: (u32, u32), bounds: (u32, u32)) -> Interpolation {
    let width_is_big = source.0 >= bounds.0;
    let height_is_big = source.1 >= bounds.1;

    match (width_is_big, height_is_big) {
        (true, true) => Interpolation::Hamming,
        (true, false) | (false, true) => Interpolation::Bicubic,
        (false, false) => Interpolation::Lanczos,
    }
}

/// Dimensions with the height pinned to the viewport.
pub fn fit_to_height(source: (u32, u32), viewport: Viewport) -> (u32, u32) {
    let width = (source.0 as f64 * viewport.height as f64 / source.1 as f64).round() as u32;
    (width.max(1), viewport.height)
}

/// Dimensions with the width pinned to the viewport.
pub fn fit_to_width(source: (u32, u32), viewport: Viewport) -> (u32, u32) {
    let height = (source.1 as f64 * viewport.width as f64 / source.0 as f64).round() as u32;
    (viewport.width, height.max(1))
}

/// Fit a source to the viewport.
///
/// Fits to height when the resulting width stays on screen, otherwise fits
/// to width and lets the height run past the bottom of the viewport.
///
/// # Examples
/// ```
/// # use fitview::imaging::{plan_fit, Interpolation, Viewport};
/// let plan = plan_fit((600, 800), Viewport::new(1920, 1080));
/// assert_eq!((plan.width, plan.height), (810, 1080));
/// assert_eq!(plan.interpolation, Interpolation::Lanczos);
/// ```
pub fn plan_fit(source: (u32, u32), viewport: Viewport) -> FitPlan {
    let interpolation = choose_interpolation(source, viewport.dimensions());
    let by_height = fit_to_height(source, viewport);
    let (width, height) = if by_height.0 <= viewport.width {
        by_height
    } else {
        fit_to_width(source, viewport)
    };

    FitPlan {
        width,
        height,
        interpolation,
    }
}

/// How many times larger than the viewport the source is, on its worst axis.
pub fn ratio_to_viewport(source: (u32, u32), viewport: Viewport) -> f64 {
    f64::max(
        source.0 as f64 / viewport.width as f64,
        source.1 as f64 / viewport.height as f64,
    )
}

/// DCT reduction for a JPEG of this size, or `None` when it is less than
/// twice the viewport.
pub fn jpeg_scale_for(source: (u32, u32), viewport: Viewport) -> Option<JpegScale> {
    let ratio = ratio_to_viewport(source, viewport);
    if ratio >= 4.0 {
        Some(JpegScale::Quarter)
    } else if ratio >= 2.0 {
        Some(JpegScale::Half)
    } else {
        None
    }
}

/// Intermediate sizes for repeated halving before the final fit.
///
/// Each step halves both axes; stepping stops once the image is within
/// twice the viewport. An image already within that bound needs no steps.
pub fn halving_steps(source: (u32, u32), viewport: Viewport) -> Vec<(u32, u32)> {
    let mut steps = Vec::new();
    let mut current = source;
    while ratio_to_viewport(current, viewport) > 2.0 {
        current = ((current.0 / 2).max(1), (current.1 / 2).max(1));
        steps.push(current);
    }
    steps
}

/// Size multiplier for a zoom level.
///
/// `growth ^ level`, boosted for extreme aspect ratios: the integer
/// width:height (or height:width) ratio over `aspect_divisor`, plus one.
pub fn zoom_factor(source: (u32, u32), level: u32, tuning: &ZoomTuning) -> f64 {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let aspect = (w / h).max(h / w);
    let boost = 1 + aspect / tuning.aspect_divisor.max(1);
    tuning.growth.powi(level as i32) * boost as f64
}

/// Plan the bitmap for a zoom level.
///
/// The screen-fit dimensions are multiplied by [`zoom_factor`]. A result
/// past `tuning.max_dimension` on either axis is [`Oversize`]. A result at
/// least twice the viewport on both axes is the practical maximum: it is
/// flagged with `hit_max_zoom` and returned at full size.
pub fn plan_zoom(
    source: (u32, u32),
    viewport: Viewport,
    level: u32,
    tuning: &ZoomTuning,
) -> Result<ZoomPlan, Oversize> {
    let fit = plan_fit(source, viewport);
    let factor = zoom_factor(source, level, tuning);
    let width = (fit.width as f64 * factor).round() as u64;
    let height = (fit.height as f64 * factor).round() as u64;

    let limit = tuning.max_dimension as u64;
    if width > limit || height > limit {
        return Err(Oversize { width, height });
    }

    let (vw, vh) = (viewport.width as u64, viewport.height as u64);
    let hit_max_zoom = width >= vw * 2 && height >= vh * 2;

    let (width, height) = ((width as u32).max(1), (height as u32).max(1));

    Ok(ZoomPlan {
        width,
        height,
        interpolation: choose_interpolation(source, (width, height)),
        hit_max_zoom,
    })
}
