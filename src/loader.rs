//! Image loader: the orchestrator between files, cache, resizer and UI.
//!
//! One [`ImageLoader`] owns everything about the image currently on screen:
//! the opened source, its full-resolution pixels once zoom needs them, the
//! per-level zoom bitmaps, zoom/rotation state and the animation runner.
//! A new [`load`](ImageLoader::load) discards all of it.
//!
//! # States
//!
//! ```text
//! Empty → Loading → Ready ─────────┐
//!                 → AnimatingReady ┤
//!                                  └→ Reloading → Ready | AnimatingReady
//!                                               → Empty (load failed)
//! ```
//!
//! # Failures
//!
//! Only a missing, unreadable or unrecognizable file is an error
//! ([`LoadError`]); the caller moves on to another file. A file that is
//! recognizably an image but fails to decode is shown as a placeholder
//! bitmap instead. Zoom failures are never errors: they cap the zoom level.

use crate::animation::{AnimationFrame, AnimationRunner, FrameTimer};
use crate::cache::{CacheEntry, ImageCache, cache_key};
use crate::config::ViewerConfig;
use crate::imaging::{
    Bitmap, Codec, CodecError, ColorMode, DecodedImage, ResizeError, Resizer, Rotation,
    SourceFormat, Zoomed, placeholder, sniff_format,
};
use crate::output::format_byte_size;
use crate::state::{ZoomDirection, ZoomModel};
use image::DynamicImage;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unrecognized image format in {}: {reason}", path.display())]
    UnrecognizedFormat { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadState {
    Empty,
    Loading,
    Reloading,
    Ready,
    AnimatingReady,
}

/// Facts about the current image for a details overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDetails {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    pub color_mode: &'static str,
    pub byte_size: u64,
    pub display_size: String,
    pub frame_count: usize,
    /// The file could not be decoded and a placeholder is on screen.
    pub placeholder: bool,
}

impl ImageDetails {
    fn from_entry(path: PathBuf, entry: &CacheEntry, frame_count: usize) -> Self {
        Self {
            path,
            width: entry.width,
            height: entry.height,
            format: entry.format,
            color_mode: entry.source_mode.label(),
            byte_size: entry.byte_size,
            display_size: entry.display_size.clone(),
            frame_count,
            placeholder: false,
        }
    }
}

/// Everything tied to the image on screen.
struct Session {
    image: Option<DecodedImage>,
    /// Full-resolution first frame; decoded on first zoom if fitting did
    /// not already produce it.
    pixels: Option<DynamicImage>,
    details: ImageDetails,
}

/// Rotated copies of animation frames, valid for one rotation of one
/// animation session.
#[derive(Default)]
struct RotatedFrames {
    generation: u64,
    rotation: Rotation,
    bitmaps: Vec<Option<Bitmap>>,
}

pub struct ImageLoader {
    resizer: Resizer,
    cache: ImageCache,
    animation: AnimationRunner,
    zoom: ZoomModel,
    /// Bitmap per zoom level; index 0 is the screen fit.
    zoomed: Vec<Bitmap>,
    rotated_frames: RotatedFrames,
    session: Option<Session>,
    state: LoadState,
}

impl ImageLoader {
    pub fn new(codec: Arc<dyn Codec>, config: &ViewerConfig) -> Self {
        let resizer = Resizer::new(codec, config.viewport(), config.zoom_tuning());
        Self {
            animation: AnimationRunner::new(resizer.clone(), config.animation_timing()),
            resizer,
            cache: ImageCache::new(config.cache.max_items),
            zoom: ZoomModel::new(config.zoom.max_level),
            zoomed: Vec::new(),
            rotated_frames: RotatedFrames::default(),
            session: None,
            state: LoadState::Empty,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn zoom_level(&self) -> u32 {
        self.zoom.level()
    }

    pub fn zoom_cap(&self) -> u32 {
        self.zoom.cap()
    }

    pub fn rotation(&self) -> Rotation {
        self.zoom.rotation()
    }

    /// Load session id; changes on every load and reset.
    pub fn generation(&self) -> u64 {
        self.animation.generation()
    }

    pub fn details(&self) -> Option<&ImageDetails> {
        self.session.as_ref().map(|s| &s.details)
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// For renames and deletes done by the file manager.
    pub fn cache_mut(&mut self) -> &mut ImageCache {
        &mut self.cache
    }

    /// Bitmap for the current zoom level and rotation.
    pub fn current_bitmap(&self) -> Option<Bitmap> {
        self.zoomed
            .get(self.zoom.level() as usize)
            .map(|b| b.rotated(self.zoom.rotation()))
    }

    /// Drop the current image and all state derived from it.
    pub fn reset_and_setup(&mut self) {
        self.animation.reset();
        self.zoomed.clear();
        self.rotated_frames = RotatedFrames::default();
        self.zoom.reset();
        self.session = None;
        self.state = LoadState::Empty;
    }

    /// Load `path` and return its screen-fitted bitmap.
    pub fn load(&mut self, path: &Path) -> Result<Bitmap, LoadError> {
        let next_state = if self.session.is_some() {
            LoadState::Reloading
        } else {
            LoadState::Loading
        };
        self.reset_and_setup();
        self.state = next_state;

        let key = match cache_key(path) {
            Ok(key) => key,
            Err(source) => {
                self.state = LoadState::Empty;
                return Err(LoadError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let bytes = std::fs::read(&key).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::NotFound(key.clone())
            } else {
                LoadError::Unreadable {
                    path: key.clone(),
                    source,
                }
            }
        });
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                self.state = LoadState::Empty;
                return Err(e);
            }
        };

        let byte_size = bytes.len() as u64;
        let hint = sniff_format(&bytes);
        let image = match self.resizer.codec().open(Arc::from(bytes), hint) {
            Ok(image) => image,
            Err(CodecError::Unrecognized(reason)) => {
                self.state = LoadState::Empty;
                return Err(LoadError::UnrecognizedFormat { path: key, reason });
            }
            Err(e @ CodecError::ProcessingFailed(_)) => {
                return Ok(self.show_placeholder(key, byte_size, hint, &ResizeError::from(e)));
            }
        };

        let info = image.info().clone();
        let (bitmap, pixels, details) = if self.cache.is_fresh(&key)
            && let Some(entry) = self.cache.get(&key)
        {
            debug!(path = %key.display(), "cache hit");
            let details = ImageDetails::from_entry(key.clone(), entry, info.frame_count);
            (entry.bitmap.clone(), None, details)
        } else {
            let fitted = match self.resizer.fit_to_screen(&image) {
                Ok(fitted) => fitted,
                Err(e) => return Ok(self.show_placeholder(key, byte_size, info.format, &e)),
            };
            let entry = CacheEntry {
                bitmap: fitted.bitmap.clone(),
                width: info.width,
                height: info.height,
                byte_size,
                display_size: format_byte_size(byte_size),
                source_mode: info.color_mode,
                format: info.format,
            };
            let details = ImageDetails::from_entry(key.clone(), &entry, info.frame_count);
            debug!(
                path = %key.display(),
                source = ?info.dimensions(),
                fitted = ?fitted.bitmap.dimensions(),
                "cache miss, fitted"
            );
            self.cache.put(key.clone(), entry);
            (fitted.bitmap, fitted.source, details)
        };

        self.state = if info.is_animated() {
            self.animation.begin(
                image.clone(),
                bitmap.clone(),
                info.frame_delay_ms,
                info.frame_count,
            );
            LoadState::AnimatingReady
        } else {
            LoadState::Ready
        };
        self.zoomed.push(bitmap.clone());
        self.session = Some(Session {
            image: Some(image),
            pixels,
            details,
        });
        Ok(bitmap)
    }

    fn show_placeholder(
        &mut self,
        path: PathBuf,
        byte_size: u64,
        format: SourceFormat,
        error: &ResizeError,
    ) -> Bitmap {
        warn!(path = %path.display(), %error, "showing placeholder");
        let viewport = self.resizer.viewport();
        let bitmap = placeholder(viewport, &format!("cannot display this image: {error}"));
        self.zoomed.push(bitmap.clone());
        self.session = Some(Session {
            image: None,
            pixels: None,
            details: ImageDetails {
                path,
                width: viewport.width,
                height: viewport.height,
                format,
                color_mode: ColorMode::Truecolor.label(),
                byte_size,
                display_size: format_byte_size(byte_size),
                frame_count: 1,
                placeholder: true,
            },
        });
        self.state = LoadState::Ready;
        bitmap
    }

    /// Apply a zoom step and/or a rotation.
    ///
    /// Returns the bitmap to show, or `None` when nothing changed. A zoom
    /// level that cannot be built rolls back and caps the zoom; if a rotation
    /// came with it, the previous level is returned rotated.
    pub fn zoom_or_rotate(
        &mut self,
        direction: Option<ZoomDirection>,
        rotation: Option<Rotation>,
    ) -> Option<Bitmap> {
        let session = self.session.as_mut()?;
        // Placeholders rotate but never zoom.
        let direction = direction.filter(|_| session.image.is_some());
        let previous_rotation = self.zoom.rotation();
        if !self.zoom.apply(direction, rotation) {
            return None;
        }
        let rotated = self.zoom.rotation() != previous_rotation;

        let level = self.zoom.level() as usize;
        if level >= self.zoomed.len() {
            match build_level(&self.resizer, session, level) {
                Ok(built) => {
                    if built.hit_max_zoom {
                        debug!(level, "zoom reached twice the viewport; capping");
                        self.zoom.hit_cap();
                    }
                    self.zoomed.push(built.bitmap);
                }
                Err(e) => {
                    info!(level, error = %e, "zoom level unavailable; capping");
                    self.zoom.roll_back();
                    self.zoom.hit_cap();
                    if !rotated {
                        return None;
                    }
                }
            }
        }
        self.current_bitmap()
    }

    /// Next animation frame, rotated to match the view.
    ///
    /// Each frame is rotated once per rotation; later cycles reuse the copy.
    pub fn next_frame(&mut self) -> Option<AnimationFrame> {
        let frame = self.animation.next_frame()?;
        let rotation = self.zoom.rotation();
        let Some(index) = self.animation.cursor().filter(|_| rotation != Rotation::Deg0) else {
            return Some(frame);
        };

        let generation = self.animation.generation();
        let cached = &mut self.rotated_frames;
        if cached.generation != generation || cached.rotation != rotation {
            *cached = RotatedFrames {
                generation,
                rotation,
                bitmaps: vec![None; self.animation.frame_count()],
            };
        }
        let bitmap = match cached.bitmaps.get_mut(index) {
            Some(slot) => slot
                .get_or_insert_with(|| frame.bitmap.rotated(rotation))
                .clone(),
            None => frame.bitmap.rotated(rotation),
        };
        Some(AnimationFrame {
            bitmap,
            delay_ms: frame.delay_ms,
        })
    }

    /// Retry schedule for the current animation, if one is playing.
    pub fn frame_timer(&self) -> Option<FrameTimer> {
        if self.state != LoadState::AnimatingReady {
            return None;
        }
        let timing = self.animation.timing();
        let first = self
            .session
            .as_ref()
            .and_then(|s| s.image.as_ref())
            .map(|image| timing.normalize_delay(image.info().frame_delay_ms))
            .unwrap_or(timing.default_delay_ms);
        Some(FrameTimer::new(timing, first))
    }

    /// Block until all animation frames are loaded. For non-interactive use.
    pub fn wait_for_frames(&mut self) {
        self.animation.wait();
    }

    pub fn animation_progress(&self) -> (usize, usize) {
        (self.animation.loaded_count(), self.animation.frame_count())
    }
}

/// Build the bitmap for `level`, decoding full-resolution pixels if needed.
fn build_level(
    resizer: &Resizer,
    session: &mut Session,
    level: usize,
) -> Result<Zoomed, ResizeError> {
    let pixels = match session.pixels.take() {
        Some(pixels) => pixels,
        None => {
            let image = session
                .image
                .as_ref()
                .ok_or_else(|| CodecError::ProcessingFailed("no source image".into()))?;
            resizer.codec().decode(image)?
        }
    };
    let built = resizer.zoomed(&pixels, level as u32);
    session.pixels = Some(pixels);
    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::tests::{MockCodec, RecordedOp};
    use crate::imaging::{Interpolation, Viewport};
    use std::fs;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n0123";

    fn setup(codec: MockCodec) -> (Arc<MockCodec>, ImageLoader, TempDir) {
        setup_with(codec, ViewerConfig::default())
    }

    fn setup_with(
        codec: MockCodec,
        config: ViewerConfig,
    ) -> (Arc<MockCodec>, ImageLoader, TempDir) {
        let codec = Arc::new(codec);
        let loader = ImageLoader::new(codec.clone(), &config);
        (codec, loader, TempDir::new().unwrap())
    }

    fn write(tmp: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    // =========================================================================
    // Loading and caching
    // =========================================================================

    #[test]
    fn load_fits_and_records_details() {
        let (_codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);

        let bitmap = loader.load(&path).unwrap();
        assert_eq!(bitmap.dimensions(), (810, 1080));
        assert_eq!(loader.state(), LoadState::Ready);

        let details = loader.details().unwrap();
        assert_eq!((details.width, details.height), (600, 800));
        assert_eq!(details.display_size, "12 B");
        assert_eq!(details.color_mode, "RGB");
        assert!(!details.placeholder);
        assert_eq!(loader.cache().len(), 1);
    }

    #[test]
    fn fresh_cache_hit_skips_resizer() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);

        let first = loader.load(&path).unwrap();
        let second = loader.load(&path).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(codec.resizes().len(), 1);
        assert_eq!(loader.state(), LoadState::Ready);
    }

    #[test]
    fn stale_cache_refits() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);
        loader.load(&path).unwrap();

        write(&tmp, "a.png", b"\x89PNG\r\n\x1a\nlonger than before");
        loader.load(&path).unwrap();
        assert_eq!(codec.resizes().len(), 2);
        assert_eq!(loader.details().unwrap().byte_size, 26);
    }

    #[test]
    fn disabled_cache_always_refits() {
        let mut config = ViewerConfig::default();
        config.cache.max_items = 0;
        let (codec, mut loader, tmp) =
            setup_with(MockCodec::still(SourceFormat::Png, 600, 800), config);
        let path = write(&tmp, "a.png", PNG_MAGIC);
        loader.load(&path).unwrap();
        loader.load(&path).unwrap();
        assert_eq!(codec.resizes().len(), 2);
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn sniffed_hint_reaches_codec() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Jpeg, 10, 10));
        let path = write(&tmp, "photo", b"\xff\xd8\xff\xe0rest");
        loader.load(&path).unwrap();
        assert_eq!(
            codec.get_operations()[0],
            RecordedOp::Open(SourceFormat::Jpeg)
        );
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn missing_file_is_not_found() {
        let (_codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 1, 1));
        let err = loader.load(&tmp.path().join("gone.png")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
        assert_eq!(loader.state(), LoadState::Empty);
        assert!(loader.details().is_none());
    }

    #[test]
    fn unrecognized_bytes_are_load_error() {
        let (_codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 1, 1));
        let path = write(&tmp, "empty.png", b"");
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, LoadError::UnrecognizedFormat { .. }));
        assert_eq!(loader.state(), LoadState::Empty);
    }

    #[test]
    fn corrupt_pixels_show_placeholder() {
        let (_codec, mut loader, tmp) =
            setup(MockCodec::still(SourceFormat::Png, 4000, 3000).failing());
        let path = write(&tmp, "broken.png", PNG_MAGIC);

        let bitmap = loader.load(&path).unwrap();
        assert_eq!(bitmap.dimensions(), (1920, 1080));
        assert!(loader.details().unwrap().placeholder);
        assert!(loader.cache().is_empty());
        assert_eq!(loader.state(), LoadState::Ready);

        // Placeholders rotate but do not zoom.
        assert!(loader.zoom_or_rotate(Some(ZoomDirection::In), None).is_none());
        let rotated = loader
            .zoom_or_rotate(None, Some(Rotation::Deg90))
            .unwrap();
        assert_eq!(rotated.dimensions(), (1080, 1920));
    }

    // =========================================================================
    // Zoom and rotation
    // =========================================================================

    #[test]
    fn oversize_first_zoom_caps_at_zero() {
        let (_codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 10000, 10));
        let path = write(&tmp, "strip.png", PNG_MAGIC);
        loader.load(&path).unwrap();

        assert!(loader.zoom_or_rotate(Some(ZoomDirection::In), None).is_none());
        assert_eq!((loader.zoom_level(), loader.zoom_cap()), (0, 0));
        assert!(loader.zoom_or_rotate(Some(ZoomDirection::In), None).is_none());
    }

    #[test]
    fn zoom_until_size_limit_rolls_back_one_level() {
        let mut config = ViewerConfig::default();
        config.zoom.max_dimension = 2000;
        let (_codec, mut loader, tmp) =
            setup_with(MockCodec::still(SourceFormat::Png, 100, 100), config);
        let path = write(&tmp, "small.png", PNG_MAGIC);
        loader.load(&path).unwrap();

        let level1 = loader.zoom_or_rotate(Some(ZoomDirection::In), None).unwrap();
        assert_eq!(level1.dimensions(), (1512, 1512));
        assert!(loader.zoom_or_rotate(Some(ZoomDirection::In), None).is_none());
        assert_eq!((loader.zoom_level(), loader.zoom_cap()), (1, 1));
    }

    #[test]
    fn zoom_until_twice_viewport_caps() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 100, 100));
        let path = write(&tmp, "small.png", PNG_MAGIC);
        loader.load(&path).unwrap();

        let mut last = None;
        while let Some(bitmap) = loader.zoom_or_rotate(Some(ZoomDirection::In), None) {
            last = Some(bitmap);
        }
        assert_eq!(last.unwrap().dimensions(), (4149, 4149));
        assert_eq!((loader.zoom_level(), loader.zoom_cap()), (4, 4));
        assert!(matches!(
            codec.resizes().last(),
            Some(RecordedOp::Resize {
                interpolation: Interpolation::Lanczos,
                ..
            })
        ));
    }

    #[test]
    fn zoom_levels_are_reused() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);
        let fit = loader.load(&path).unwrap();

        let zoomed = loader.zoom_or_rotate(Some(ZoomDirection::In), None).unwrap();
        let back = loader.zoom_or_rotate(Some(ZoomDirection::Out), None).unwrap();
        assert!(back.ptr_eq(&fit));
        let again = loader.zoom_or_rotate(Some(ZoomDirection::In), None).unwrap();
        assert!(again.ptr_eq(&zoomed));
        // One fit plus one zoom level.
        assert_eq!(codec.resizes().len(), 2);
    }

    #[test]
    fn rotation_applies_to_cached_level() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);
        loader.load(&path).unwrap();

        let rotated = loader
            .zoom_or_rotate(None, Some(Rotation::Deg90))
            .unwrap();
        assert_eq!(rotated.dimensions(), (1080, 810));
        assert_eq!(codec.resizes().len(), 1);
        assert!(loader.zoom_or_rotate(None, Some(Rotation::Deg90)).is_none());
    }

    #[test]
    fn blocked_zoom_still_lets_rotation_through() {
        let (_codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);
        loader.load(&path).unwrap();

        let rotated = loader
            .zoom_or_rotate(Some(ZoomDirection::Out), Some(Rotation::Deg270))
            .unwrap();
        assert_eq!(rotated.dimensions(), (1080, 810));
        assert_eq!((loader.zoom_level(), loader.rotation()), (0, Rotation::Deg270));
    }

    #[test]
    fn zoom_after_cache_hit_decodes_pixels() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);
        loader.load(&path).unwrap();
        loader.load(&path).unwrap();
        let decodes_before = codec
            .get_operations()
            .iter()
            .filter(|op| **op == RecordedOp::Decode)
            .count();

        loader.zoom_or_rotate(Some(ZoomDirection::In), None).unwrap();
        let decodes_after = codec
            .get_operations()
            .iter()
            .filter(|op| **op == RecordedOp::Decode)
            .count();
        assert_eq!(decodes_after, decodes_before + 1);
    }

    #[test]
    fn new_load_resets_zoom_and_rotation() {
        let (_codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let path = write(&tmp, "a.png", PNG_MAGIC);
        loader.load(&path).unwrap();
        loader.zoom_or_rotate(Some(ZoomDirection::In), Some(Rotation::Deg180));

        loader.load(&path).unwrap();
        assert_eq!(loader.zoom_level(), 0);
        assert_eq!(loader.rotation(), Rotation::Deg0);
        assert_eq!(loader.current_bitmap().unwrap().dimensions(), (810, 1080));
    }

    // =========================================================================
    // Animation and session lifecycle
    // =========================================================================

    #[test]
    fn animated_image_starts_runner() {
        let (_codec, mut loader, tmp) = setup(MockCodec::animated(320, 240, 4, 70));
        let path = write(&tmp, "anim.gif", b"GIF89a....");
        loader.load(&path).unwrap();
        assert_eq!(loader.state(), LoadState::AnimatingReady);

        let timer = loader.frame_timer().unwrap();
        assert_eq!(timer.backoff_ms(), 120);
        assert_eq!(loader.next_frame().unwrap().delay_ms, 70);

        loader.wait_for_frames();
        assert_eq!(loader.animation_progress(), (4, 4));
    }

    #[test]
    fn rotated_frames_are_reused_across_cycles() {
        let (_codec, mut loader, tmp) = setup(MockCodec::animated(320, 240, 3, 70));
        let path = write(&tmp, "anim.gif", b"GIF89a....");
        loader.load(&path).unwrap();
        loader.wait_for_frames();
        loader.zoom_or_rotate(None, Some(Rotation::Deg90)).unwrap();

        let first: Vec<Bitmap> = (0..3).map(|_| loader.next_frame().unwrap().bitmap).collect();
        let second: Vec<Bitmap> = (0..3).map(|_| loader.next_frame().unwrap().bitmap).collect();
        assert_eq!(first[0].dimensions(), (1080, 1440));
        assert!(first.iter().zip(&second).all(|(a, b)| a.ptr_eq(b)));

        // A new rotation rotates afresh.
        loader.zoom_or_rotate(None, Some(Rotation::Deg180)).unwrap();
        let flipped = loader.next_frame().unwrap().bitmap;
        assert_eq!(flipped.dimensions(), (1440, 1080));
        assert!(!flipped.ptr_eq(&first[0]));
    }

    #[test]
    fn reset_and_setup_clears_session() {
        let (_codec, mut loader, tmp) = setup(MockCodec::animated(32, 24, 3, 70));
        let path = write(&tmp, "anim.gif", b"GIF89a....");
        loader.load(&path).unwrap();
        let generation = loader.generation();

        loader.reset_and_setup();
        assert!(loader.generation() > generation);
        assert_eq!(loader.state(), LoadState::Empty);
        assert!(loader.details().is_none());
        assert!(loader.next_frame().is_none());
        assert!(loader.frame_timer().is_none());
        assert!(loader.zoom_or_rotate(Some(ZoomDirection::In), None).is_none());
    }

    #[test]
    fn cache_follows_rename() {
        let (codec, mut loader, tmp) = setup(MockCodec::still(SourceFormat::Png, 600, 800));
        let old = write(&tmp, "old.png", PNG_MAGIC);
        loader.load(&old).unwrap();

        let new = tmp.path().join("new.png");
        fs::rename(&old, &new).unwrap();
        loader
            .cache_mut()
            .rename_key(&cache_key(&old).unwrap(), cache_key(&new).unwrap());
        loader.load(&new).unwrap();
        assert_eq!(codec.resizes().len(), 1);
    }

    #[test]
    fn viewport_comes_from_config() {
        let mut config = ViewerConfig::default();
        config.viewport.width = 800;
        config.viewport.height = 600;
        let (_codec, mut loader, tmp) =
            setup_with(MockCodec::still(SourceFormat::Png, 4000, 3000).failing(), config);
        let path = write(&tmp, "broken.png", PNG_MAGIC);
        let bitmap = loader.load(&path).unwrap();
        assert_eq!(bitmap.dimensions(), Viewport::new(800, 600).dimensions());
    }
}
