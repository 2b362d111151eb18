//! High-level resize operations.
//!
//! [`Resizer`] combines the pure geometry in [`calculations`](super::calculations)
//! with a [`Codec`] that does the pixel work. It owns the viewport and zoom
//! tuning, so callers only ever pass images and zoom levels.

use super::bitmap::Bitmap;
use super::calculations::{Oversize, halving_steps, jpeg_scale_for, plan_fit, plan_zoom};
use super::codec::{Codec, CodecError, DecodedImage, SourceFormat};
use super::params::{Interpolation, Viewport, ZoomTuning};
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResizeError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A zoom level whose bitmap would exceed the per-axis pixel limit.
    #[error("zoomed size {width}x{height} exceeds the per-axis pixel limit")]
    SizeExceeded { width: u64, height: u64 },
}

impl From<Oversize> for ResizeError {
    fn from(o: Oversize) -> Self {
        Self::SizeExceeded {
            width: o.width,
            height: o.height,
        }
    }
}

/// Result of fitting a source to the screen.
#[derive(Debug)]
pub struct Fitted {
    pub bitmap: Bitmap,
    /// Full-resolution first frame, when fitting had to decode it anyway.
    /// `None` after a DCT-scaled JPEG decode.
    pub source: Option<DynamicImage>,
}

/// Result of one zoom level.
#[derive(Debug)]
pub struct Zoomed {
    pub bitmap: Bitmap,
    /// No deeper level is useful; the caller should cap zoom here.
    pub hit_max_zoom: bool,
}

/// Fits and zooms images for one viewport.
#[derive(Clone)]
pub struct Resizer {
    codec: Arc<dyn Codec>,
    viewport: Viewport,
    tuning: ZoomTuning,
}

impl Resizer {
    pub fn new(codec: Arc<dyn Codec>, viewport: Viewport, tuning: ZoomTuning) -> Self {
        Self {
            codec,
            viewport,
            tuning,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Fit the first frame of `image` to the viewport.
    ///
    /// - Animations and images already inside the viewport get one resize.
    /// - Large JPEGs are decoded at 1/2 or 1/4 scale first.
    /// - Other large images are halved with a cheap filter until within
    ///   twice the viewport, then resized once precisely.
    pub fn fit_to_screen(&self, image: &DecodedImage) -> Result<Fitted, ResizeError> {
        let info = image.info();
        let source = info.dimensions();
        let plan = plan_fit(source, self.viewport);
        let fits = source.0 <= self.viewport.width && source.1 <= self.viewport.height;

        if !info.is_animated()
            && !fits
            && info.format == SourceFormat::Jpeg
            && let Some(scale) = jpeg_scale_for(source, self.viewport)
        {
            debug!(?scale, ?source, "scaled JPEG decode");
            let reduced = self.codec.decode_jpeg_scaled(image, scale)?;
            let fitted = self
                .codec
                .resize(&reduced, plan.width, plan.height, plan.interpolation)?;
            return Ok(Fitted {
                bitmap: Bitmap::new(fitted),
                source: None,
            });
        }

        let full = self.codec.decode(image)?;
        let steps = if info.is_animated() || fits {
            Vec::new()
        } else {
            halving_steps(source, self.viewport)
        };

        let mut current: Option<DynamicImage> = None;
        for (width, height) in &steps {
            let from = current.as_ref().unwrap_or(&full);
            current = Some(
                self.codec
                    .resize(from, *width, *height, Interpolation::Hamming)?,
            );
        }
        if !steps.is_empty() {
            debug!(?source, steps = steps.len(), "halved before fit");
        }

        let from = current.as_ref().unwrap_or(&full);
        let fitted = self
            .codec
            .resize(from, plan.width, plan.height, plan.interpolation)?;
        Ok(Fitted {
            bitmap: Bitmap::new(fitted),
            source: Some(full),
        })
    }

    /// Fit one decoded animation frame.
    pub fn fit_frame(&self, frame: &DynamicImage) -> Result<Bitmap, ResizeError> {
        let plan = plan_fit((frame.width(), frame.height()), self.viewport);
        let fitted = self
            .codec
            .resize(frame, plan.width, plan.height, plan.interpolation)?;
        Ok(Bitmap::new(fitted))
    }

    /// Resize full-resolution pixels for `level`.
    ///
    /// [`ResizeError::SizeExceeded`] means this level cannot exist and the
    /// caller should roll back and cap.
    pub fn zoomed(&self, source: &DynamicImage, level: u32) -> Result<Zoomed, ResizeError> {
        let plan = plan_zoom(
            (source.width(), source.height()),
            self.viewport,
            level,
            &self.tuning,
        )?;
        let resized = self
            .codec
            .resize(source, plan.width, plan.height, plan.interpolation)?;
        Ok(Zoomed {
            bitmap: Bitmap::new(resized),
            hit_max_zoom: plan.hit_max_zoom,
        })
    }
}
