//! Display-ready bitmaps.

use super::params::Rotation;
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;

/// A decoded, display-sized image.
///
/// Cheap to clone: the pixels are shared. The cache, the zoom pyramid and
/// the animation frame table all hand out the same `Bitmap`.
#[derive(Clone)]
pub struct Bitmap(Arc<DynamicImage>);

impl Bitmap {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.0.width(), self.0.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    /// Whether both handles point at the same pixels.
    pub fn ptr_eq(&self, other: &Bitmap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A copy turned clockwise. `Deg0` shares pixels with `self`.
    pub fn rotated(&self, rotation: Rotation) -> Bitmap {
        match rotation {
            Rotation::Deg0 => self.clone(),
            Rotation::Deg90 => Bitmap::new(self.0.rotate90()),
            Rotation::Deg180 => Bitmap::new(self.0.rotate180()),
            Rotation::Deg270 => Bitmap::new(self.0.rotate270()),
        }
    }
}

impl From<DynamicImage> for Bitmap {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width(), self.height())
    }
}
