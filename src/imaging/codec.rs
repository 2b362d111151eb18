//! Codec trait and the types that cross it.
//!
//! The [`Codec`] trait is the seam between viewer logic and pixel work:
//! open (header only), full decode, DCT-scaled JPEG decode, resize, and
//! frame iteration for animations. Everything above it is codec-agnostic,
//! which is what lets the resizer and loader tests run against a recording
//! mock instead of real pixels.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec).

use super::params::{Interpolation, JpegScale};
use image::DynamicImage;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes are not any image format the codec can parse.
    #[error("unrecognized image data: {0}")]
    Unrecognized(String),
    /// Headers parsed but pixel data is malformed, or an operation failed.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

/// Container format of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Avif,
    Dds,
    Bmp,
    Tiff,
    Unknown,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::WebP => "WEBP",
            Self::Avif => "AVIF",
            Self::Dds => "DDS",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The `image` crate format, for formats it decodes.
    ///
    /// AVIF is `None`: the `image` crate's `avif` feature only encodes, so
    /// AVIF goes through `avif-parse` + `rav1d` instead.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Png => Some(image::ImageFormat::Png),
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::WebP => Some(image::ImageFormat::WebP),
            Self::Dds => Some(image::ImageFormat::Dds),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Avif | Self::Unknown => None,
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Self {
        match format {
            image::ImageFormat::Png => Self::Png,
            image::ImageFormat::Jpeg => Self::Jpeg,
            image::ImageFormat::Gif => Self::Gif,
            image::ImageFormat::WebP => Self::WebP,
            image::ImageFormat::Avif => Self::Avif,
            image::ImageFormat::Dds => Self::Dds,
            image::ImageFormat::Bmp => Self::Bmp,
            image::ImageFormat::Tiff => Self::Tiff,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color layout of the source, before any conversion for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    Grayscale,
    GrayscaleAlpha,
    Palette,
    Truecolor,
    TruecolorAlpha,
}

impl ColorMode {
    /// Short mode label, as shown in an image details overlay.
    pub fn label(self) -> &'static str {
        match self {
            Self::Grayscale => "L",
            Self::GrayscaleAlpha => "LA",
            Self::Palette => "P",
            Self::Truecolor => "RGB",
            Self::TruecolorAlpha => "RGBA",
        }
    }

    pub fn from_color_type(color: image::ColorType) -> Self {
        use image::ColorType;
        match color {
            ColorType::L8 | ColorType::L16 => Self::Grayscale,
            ColorType::La8 | ColorType::La16 => Self::GrayscaleAlpha,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => Self::TruecolorAlpha,
            _ => Self::Truecolor,
        }
    }
}

/// Header-level facts about a source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    pub frame_count: usize,
    /// Delay of the first frame, when the container declares one.
    pub frame_delay_ms: Option<u32>,
    pub color_mode: ColorMode,
}

impl ImageInfo {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }
}

/// An opened source image: the file bytes plus parsed header facts.
///
/// Pixels are not decoded until [`Codec::decode`] (or the fast JPEG path)
/// asks for them. Cloning shares the bytes.
#[derive(Clone)]
pub struct DecodedImage {
    bytes: Arc<[u8]>,
    info: ImageInfo,
}

impl DecodedImage {
    pub fn new(bytes: Arc<[u8]>, info: ImageInfo) -> Self {
        Self { bytes, info }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("bytes", &self.bytes.len())
            .field("info", &self.info)
            .finish()
    }
}

/// One composited frame of an animation, at source resolution.
pub struct RawFrame {
    pub image: DynamicImage,
    pub delay_ms: Option<u32>,
}

/// Sequential frames of an image, starting at frame 0.
pub type FrameIter<'a> = Box<dyn Iterator<Item = Result<RawFrame, CodecError>> + 'a>;

/// Image codec operations needed by the viewer pipeline.
///
/// Implementations are shared between the foreground and the animation
/// thread, hence `Send + Sync`.
pub trait Codec: Send + Sync {
    /// Parse headers. `hint` is the sniffed format, tried first.
    fn open(&self, bytes: Arc<[u8]>, hint: SourceFormat) -> Result<DecodedImage, CodecError>;

    /// Decode the first frame at full resolution.
    fn decode(&self, image: &DecodedImage) -> Result<DynamicImage, CodecError>;

    /// Decode a JPEG directly at a reduced size.
    fn decode_jpeg_scaled(
        &self,
        image: &DecodedImage,
        scale: JpegScale,
    ) -> Result<DynamicImage, CodecError>;

    /// Resample to exactly `width` x `height`.
    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        interpolation: Interpolation,
    ) -> Result<DynamicImage, CodecError>;

    /// Iterate frames in order. Must be called on the thread that consumes
    /// the iterator.
    fn frames<'a>(&'a self, image: &'a DecodedImage) -> Result<FrameIter<'a>, CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc::{Receiver, Sender, channel};

    /// Mock codec that records operations and fabricates blank pixels of the
    /// requested sizes. Uses Mutex (not RefCell) so it is Sync and can be
    /// shared with the animation thread.
    pub struct MockCodec {
        pub info: ImageInfo,
        pub fail_decode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// When set, each frame after the first waits for one message.
        frame_gate: Mutex<Option<Receiver<()>>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Open(SourceFormat),
        Decode,
        DecodeJpegScaled(JpegScale),
        Resize {
            from: (u32, u32),
            to: (u32, u32),
            interpolation: Interpolation,
        },
        Frames,
    }

    pub fn still_info(format: SourceFormat, width: u32, height: u32) -> ImageInfo {
        ImageInfo {
            width,
            height,
            format,
            frame_count: 1,
            frame_delay_ms: None,
            color_mode: ColorMode::Truecolor,
        }
    }

    impl MockCodec {
        pub fn new(info: ImageInfo) -> Self {
            Self {
                info,
                fail_decode: false,
                operations: Mutex::new(Vec::new()),
                frame_gate: Mutex::new(None),
            }
        }

        pub fn still(format: SourceFormat, width: u32, height: u32) -> Self {
            Self::new(still_info(format, width, height))
        }

        pub fn animated(width: u32, height: u32, frame_count: usize, delay_ms: u32) -> Self {
            Self::new(ImageInfo {
                width,
                height,
                format: SourceFormat::Gif,
                frame_count,
                frame_delay_ms: Some(delay_ms),
                color_mode: ColorMode::Palette,
            })
        }

        pub fn failing(mut self) -> Self {
            self.fail_decode = true;
            self
        }

        /// Hold frames 1.. until the returned sender releases them.
        pub fn gated(self) -> (Self, Sender<()>) {
            let (tx, rx) = channel();
            *self.frame_gate.lock().unwrap() = Some(rx);
            (self, tx)
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resizes(&self) -> Vec<RecordedOp> {
            self.get_operations()
                .into_iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .collect()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn blank(&self, width: u32, height: u32) -> Result<DynamicImage, CodecError> {
            if self.fail_decode {
                return Err(CodecError::ProcessingFailed("corrupt scan data".into()));
            }
            Ok(DynamicImage::new_rgba8(width, height))
        }
    }

    impl Codec for MockCodec {
        fn open(&self, bytes: Arc<[u8]>, hint: SourceFormat) -> Result<DecodedImage, CodecError> {
            self.record(RecordedOp::Open(hint));
            if bytes.is_empty() {
                return Err(CodecError::Unrecognized("empty file".into()));
            }
            Ok(DecodedImage::new(bytes, self.info.clone()))
        }

        fn decode(&self, image: &DecodedImage) -> Result<DynamicImage, CodecError> {
            self.record(RecordedOp::Decode);
            self.blank(image.info().width, image.info().height)
        }

        fn decode_jpeg_scaled(
            &self,
            image: &DecodedImage,
            scale: JpegScale,
        ) -> Result<DynamicImage, CodecError> {
            self.record(RecordedOp::DecodeJpegScaled(scale));
            self.blank(scale.apply(image.info().width), scale.apply(image.info().height))
        }

        fn resize(
            &self,
            image: &DynamicImage,
            width: u32,
            height: u32,
            interpolation: Interpolation,
        ) -> Result<DynamicImage, CodecError> {
            self.record(RecordedOp::Resize {
                from: (image.width(), image.height()),
                to: (width, height),
                interpolation,
            });
            Ok(DynamicImage::new_rgba8(width, height))
        }

        fn frames<'a>(&'a self, image: &'a DecodedImage) -> Result<FrameIter<'a>, CodecError> {
            self.record(RecordedOp::Frames);
            let info = image.info().clone();
            Ok(Box::new((0..info.frame_count).map(move |index| {
                if index > 0
                    && let Some(gate) = self.frame_gate.lock().unwrap().as_ref()
                {
                    // A dropped sender releases everything.
                    let _ = gate.recv();
                }
                Ok(RawFrame {
                    image: self.blank(info.width, info.height)?,
                    delay_ms: Some(40 + index as u32),
                })
            })))
        }
    }

    #[test]
    fn mock_records_open_and_decode() {
        let codec = MockCodec::still(SourceFormat::Png, 64, 48);
        let image = codec
            .open(Arc::from(vec![1u8, 2, 3]), SourceFormat::Png)
            .unwrap();
        let pixels = codec.decode(&image).unwrap();
        assert_eq!((pixels.width(), pixels.height()), (64, 48));
        assert_eq!(
            codec.get_operations(),
            vec![RecordedOp::Open(SourceFormat::Png), RecordedOp::Decode]
        );
    }

    #[test]
    fn mock_failing_decode_is_processing_error() {
        let codec = MockCodec::still(SourceFormat::Jpeg, 10, 10).failing();
        let image = codec.open(Arc::from(vec![0xFF]), SourceFormat::Jpeg).unwrap();
        assert!(matches!(
            codec.decode(&image),
            Err(CodecError::ProcessingFailed(_))
        ));
    }

    #[test]
    fn mock_empty_bytes_unrecognized() {
        let codec = MockCodec::still(SourceFormat::Png, 1, 1);
        assert!(matches!(
            codec.open(Arc::from(Vec::new()), SourceFormat::Avif),
            Err(CodecError::Unrecognized(_))
        ));
    }

    #[test]
    fn color_mode_labels() {
        assert_eq!(ColorMode::from_color_type(image::ColorType::L8).label(), "L");
        assert_eq!(
            ColorMode::from_color_type(image::ColorType::Rgba16).label(),
            "RGBA"
        );
        assert_eq!(ColorMode::from_color_type(image::ColorType::Rgb8).label(), "RGB");
    }

    #[test]
    fn source_format_round_trips_through_image_format() {
        for format in [
            SourceFormat::Png,
            SourceFormat::Jpeg,
            SourceFormat::Gif,
            SourceFormat::WebP,
            SourceFormat::Dds,
            SourceFormat::Bmp,
            SourceFormat::Tiff,
        ] {
            let image_format = format.image_format().unwrap();
            assert_eq!(SourceFormat::from_image_format(image_format), format);
        }
        assert_eq!(SourceFormat::Avif.image_format(), None);
        assert_eq!(SourceFormat::Tiff.as_str(), "TIFF");
    }
}
