//! Pure Rust codec built on the `image` crate ecosystem.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Header probe (PNG, JPEG, GIF, WebP, DDS, BMP, TIFF) | `image::ImageReader::into_decoder` |
//! | Header probe (AVIF) | `avif-parse` primary item metadata |
//! | Frame count / first delay | [`container`](super::container) scanners |
//! | Decode | `image::load_from_memory_with_format` |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1) + BT.601 YUV→RGB |
//! | DCT-scaled JPEG decode | `jpeg-decoder` `Decoder::scale` |
//! | Resize | `DynamicImage::resize_exact` |
//! | Frames | `AnimationDecoder::into_frames` for GIF, WebP, APNG |

use super::codec::{
    Codec, CodecError, ColorMode, DecodedImage, FrameIter, ImageInfo, RawFrame, SourceFormat,
};
use super::container::{png_is_palette, probe_animation};
use super::params::{Interpolation, JpegScale};
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

/// Production [`Codec`]. Stateless; share one behind an `Arc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

fn processing(context: &str, err: impl std::fmt::Display) -> CodecError {
    CodecError::ProcessingFailed(format!("{context}: {err}"))
}

/// Header facts via the `image` crate's decoder for an explicit format.
///
/// The format is already known (sniffed or guessed), so a failure here means
/// the file is that format but damaged.
fn probe_with_image(bytes: &[u8], format: ImageFormat) -> Result<ImageInfo, CodecError> {
    let decoder = ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .map_err(|e| processing("invalid header", e))?;
    let (width, height) = decoder.dimensions();
    let source = SourceFormat::from_image_format(format);

    let color_mode = match source {
        SourceFormat::Gif => ColorMode::Palette,
        SourceFormat::Png if png_is_palette(bytes) => ColorMode::Palette,
        _ => ColorMode::from_color_type(decoder.color_type()),
    };
    let animation = probe_animation(source, bytes);

    Ok(ImageInfo {
        width,
        height,
        format: source,
        frame_count: animation.frame_count,
        frame_delay_ms: animation.first_delay_ms,
        color_mode,
    })
}

fn parse_avif(bytes: &[u8]) -> Result<avif_parse::AvifData, CodecError> {
    avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| CodecError::Unrecognized(format!("not an AVIF container: {e:?}")))
}

/// AVIF dimensions from container metadata; no AV1 decode.
fn probe_avif(bytes: &[u8]) -> Result<ImageInfo, CodecError> {
    let avif = parse_avif(bytes)?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| CodecError::ProcessingFailed(format!("AVIF metadata: {e:?}")))?;
    Ok(ImageInfo {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
        format: SourceFormat::Avif,
        frame_count: 1,
        frame_delay_ms: None,
        color_mode: ColorMode::Truecolor,
    })
}

/// Decode the primary AV1 item of an AVIF file with rav1d.
///
/// The `image` crate's `avif` feature is encode-only; decoding through it
/// needs the C dav1d library.
fn decode_avif(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = parse_avif(bytes).map_err(|e| processing("AVIF", e))?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| CodecError::ProcessingFailed("rav1d settings".into()))?;
    unsafe { dav1d::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(CodecError::ProcessingFailed(format!(
            "rav1d open failed ({})",
            rc.0
        )));
    }

    // Everything between open and close; the context is closed exactly once
    // below whatever this returns.
    let decoded = (|| -> Result<DynamicImage, CodecError> {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(CodecError::ProcessingFailed(
                "rav1d data_create failed".into(),
            ));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(CodecError::ProcessingFailed(format!(
                "rav1d send_data failed ({})",
                rc.0
            )));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(CodecError::ProcessingFailed(format!(
                "rav1d get_picture failed ({})",
                rc.0
            )));
        }

        let plane = |i: usize| pic.data[i].map(|p| p.as_ptr() as *const u8);
        let layout = pic.p.layout;
        let subsampling = match layout {
            DAV1D_PIXEL_LAYOUT_I400 => Some(None),
            DAV1D_PIXEL_LAYOUT_I420 => Some(Some((true, true))),
            DAV1D_PIXEL_LAYOUT_I422 => Some(Some((true, false))),
            DAV1D_PIXEL_LAYOUT_I444 => Some(Some((false, false))),
            _ => None,
        };

        let planes = match (subsampling, plane(0)) {
            (Some(None), Some(y)) => Ok(YuvPlanes {
                luma: (y, pic.stride[0]),
                chroma: None,
                width: pic.p.w as u32,
                height: pic.p.h as u32,
                bpc: pic.p.bpc as u32,
            }),
            (Some(Some(ss)), Some(y)) => match (plane(1), plane(2)) {
                (Some(u), Some(v)) => Ok(YuvPlanes {
                    luma: (y, pic.stride[0]),
                    chroma: Some(Chroma {
                        u,
                        v,
                        stride: pic.stride[1],
                        subsampled: ss,
                    }),
                    width: pic.p.w as u32,
                    height: pic.p.h as u32,
                    bpc: pic.p.bpc as u32,
                }),
                _ => Err(CodecError::ProcessingFailed(
                    "AVIF picture missing chroma planes".into(),
                )),
            },
            (None, _) => Err(CodecError::ProcessingFailed(format!(
                "unsupported AVIF pixel layout: {layout}"
            ))),
            (_, None) => Err(CodecError::ProcessingFailed(
                "AVIF picture missing luma plane".into(),
            )),
        };

        let result = planes.and_then(|planes| {
            let rgb = unsafe { planes.to_rgb8() };
            image::RgbImage::from_raw(planes.width, planes.height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| CodecError::ProcessingFailed("AVIF buffer size mismatch".into()))
        });
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut pic)) };
        result
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

struct Chroma {
    u: *const u8,
    v: *const u8,
    stride: isize,
    /// Horizontal, vertical (I420 is both).
    subsampled: (bool, bool),
}

/// Borrowed YUV planes of a rav1d picture.
struct YuvPlanes {
    luma: (*const u8, isize),
    /// `None` for monochrome (I400).
    chroma: Option<Chroma>,
    width: u32,
    height: u32,
    bpc: u32,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    ///
    /// # Safety
    /// Plane pointers and strides must describe a live picture of
    /// `width` x `height` samples at `bpc` bits.
    unsafe fn to_rgb8(&self) -> Vec<u8> {
        let max = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max;
        let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

        let mut rgb = vec![0u8; self.width as usize * self.height as usize * 3];
        for (i, px) in rgb.chunks_exact_mut(3).enumerate() {
            let col = (i % self.width as usize) as u32;
            let row = (i / self.width as usize) as u32;
            let y = unsafe { sample(self.luma.0, self.luma.1, col, row, self.bpc) };

            match &self.chroma {
                None => px.fill(to_u8(y)),
                Some(c) => {
                    let cx = if c.subsampled.0 { col / 2 } else { col };
                    let cy = if c.subsampled.1 { row / 2 } else { row };
                    let cb = unsafe { sample(c.u, c.stride, cx, cy, self.bpc) } - center;
                    let cr = unsafe { sample(c.v, c.stride, cx, cy, self.bpc) } - center;
                    px[0] = to_u8(y + 1.402 * cr);
                    px[1] = to_u8(y - 0.344136 * cb - 0.714136 * cr);
                    px[2] = to_u8(y + 1.772 * cb);
                }
            }
        }
        rgb
    }
}

/// One sample from a plane; above 8 bits samples are stored as `u16`.
///
/// # Safety
/// `(x, y)` must lie inside the plane addressed by `ptr` and `stride`.
#[inline]
unsafe fn sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let offset = y as isize * stride + x as isize * 2;
        (unsafe { (ptr.offset(offset) as *const u16).read_unaligned() }) as f32
    }
}

/// DCT-domain reduced decode with `jpeg-decoder`.
fn decode_jpeg_scaled(
    bytes: &[u8],
    full: (u32, u32),
    scale: JpegScale,
) -> Result<DynamicImage, CodecError> {
    use jpeg_decoder::{Decoder, PixelFormat};

    let mut decoder = Decoder::new(Cursor::new(bytes));
    let (num, den) = scale.ratio();
    let request = |axis: u32| (axis * num).div_ceil(den).clamp(1, u16::MAX as u32) as u16;
    // `scale` reads the headers and picks the smallest IDCT size that still
    // covers the request.
    let (width, height) = decoder
        .scale(request(full.0), request(full.1))
        .map_err(|e| processing("JPEG scale", e))?;
    let pixels = decoder
        .decode()
        .map_err(|e| processing("JPEG decode", e))?;
    let info = decoder
        .info()
        .ok_or_else(|| CodecError::ProcessingFailed("JPEG info missing after decode".into()))?;
    let (width, height) = (width as u32, height as u32);

    let image = match info.pixel_format {
        PixelFormat::L8 => image::GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        PixelFormat::L16 => {
            let samples = pixels
                .chunks_exact(2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .collect();
            image::ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageLuma16)
        }
        PixelFormat::RGB24 => image::RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        PixelFormat::CMYK32 => {
            let rgb = pixels
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - p[3] as u32;
                    [0, 1, 2].map(|i| ((255 - p[i] as u32) * k / 255) as u8)
                })
                .collect();
            image::RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
    };
    image.ok_or_else(|| CodecError::ProcessingFailed("JPEG buffer size mismatch".into()))
}

impl Codec for RustCodec {
    fn open(&self, bytes: Arc<[u8]>, hint: SourceFormat) -> Result<DecodedImage, CodecError> {
        let info = match hint.image_format() {
            Some(format) => probe_with_image(&bytes, format)?,
            None => match probe_avif(&bytes) {
                Ok(info) => info,
                // AVIF is the sniffer's fallback, so this is where BMP, TIFF
                // and friends land. Let the `image` crate guess from content.
                Err(avif_err) => match image::guess_format(&bytes) {
                    Ok(ImageFormat::Avif) => return Err(processing("AVIF", avif_err)),
                    Ok(format) => probe_with_image(&bytes, format)?,
                    Err(_) => return Err(avif_err),
                },
            },
        };
        tracing::trace!(
            width = info.width,
            height = info.height,
            format = %info.format,
            frames = info.frame_count,
            "opened image"
        );
        Ok(DecodedImage::new(bytes, info))
    }

    fn decode(&self, image: &DecodedImage) -> Result<DynamicImage, CodecError> {
        let bytes = image.bytes();
        match image.info().format {
            SourceFormat::Avif => decode_avif(bytes),
            format => match format.image_format() {
                Some(f) => image::load_from_memory_with_format(bytes, f),
                None => image::load_from_memory(bytes),
            }
            .map_err(|e| processing("decode failed", e)),
        }
    }

    fn decode_jpeg_scaled(
        &self,
        image: &DecodedImage,
        scale: JpegScale,
    ) -> Result<DynamicImage, CodecError> {
        if image.info().format != SourceFormat::Jpeg {
            return Err(CodecError::ProcessingFailed(format!(
                "scaled decode needs JPEG, got {}",
                image.info().format
            )));
        }
        decode_jpeg_scaled(image.bytes(), image.info().dimensions(), scale)
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        interpolation: Interpolation,
    ) -> Result<DynamicImage, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::ProcessingFailed(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        if (image.width(), image.height()) == (width, height) {
            return Ok(image.clone());
        }
        Ok(image.resize_exact(width, height, interpolation.filter_type()))
    }

    fn frames<'a>(&'a self, image: &'a DecodedImage) -> Result<FrameIter<'a>, CodecError> {
        let cursor = Cursor::new(image.bytes());
        let frames = match image.info().format {
            SourceFormat::Gif => GifDecoder::new(cursor)
                .map_err(|e| processing("GIF", e))?
                .into_frames(),
            SourceFormat::WebP => WebPDecoder::new(cursor)
                .map_err(|e| processing("WebP", e))?
                .into_frames(),
            SourceFormat::Png => PngDecoder::new(cursor)
                .and_then(|png| png.apng())
                .map_err(|e| processing("APNG", e))?
                .into_frames(),
            _ => {
                let still = self.decode(image)?;
                return Ok(Box::new(std::iter::once(Ok(RawFrame {
                    image: still,
                    delay_ms: None,
                }))));
            }
        };

        Ok(Box::new(frames.map(|frame| {
            let frame = frame.map_err(|e| processing("frame decode", e))?;
            let (num, den) = frame.delay().numer_denom_ms();
            Ok(RawFrame {
                delay_ms: (den != 0).then(|| num / den),
                image: DynamicImage::ImageRgba8(frame.into_buffer()),
            })
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::sniff_format;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};

    fn encode(image: &DynamicImage, format: ImageFormat) -> Arc<[u8]> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        Arc::from(buf.into_inner())
    }

    fn open(bytes: Arc<[u8]>) -> Result<DecodedImage, CodecError> {
        let hint = sniff_format(&bytes);
        RustCodec.open(bytes, hint)
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn animated_gif(frames: u32) -> Arc<[u8]> {
        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buf);
            let frames = (0..frames).map(|i| {
                let image = RgbaImage::from_pixel(8, 6, Rgba([i as u8 * 40, 0, 0, 255]));
                Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(60, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        Arc::from(buf)
    }

    #[test]
    fn open_png_reads_header_only_facts() {
        let image = open(encode(&gradient(64, 32), ImageFormat::Png)).unwrap();
        let info = image.info();
        assert_eq!(info.dimensions(), (64, 32));
        assert_eq!(info.format, SourceFormat::Png);
        assert_eq!(info.frame_count, 1);
        assert_eq!(info.color_mode, ColorMode::Truecolor);
    }

    #[test]
    fn decode_png_round_trips_pixels() {
        let source = gradient(20, 10);
        let image = open(encode(&source, ImageFormat::Png)).unwrap();
        let decoded = RustCodec.decode(&image).unwrap();
        assert_eq!(decoded.to_rgb8(), source.to_rgb8());
    }

    #[test]
    fn truncated_png_fails_at_decode() {
        let bytes = encode(&gradient(200, 200), ImageFormat::Png);
        let truncated: Arc<[u8]> = Arc::from(&bytes[..bytes.len() / 3]);
        let image = open(truncated).unwrap();
        assert!(matches!(
            RustCodec.decode(&image),
            Err(CodecError::ProcessingFailed(_))
        ));
    }

    #[test]
    fn png_magic_with_garbage_is_processing_error() {
        let bytes: Arc<[u8]> = Arc::from(b"\x89PNG this is not a png".to_vec());
        assert!(matches!(open(bytes), Err(CodecError::ProcessingFailed(_))));
    }

    #[test]
    fn garbage_is_unrecognized() {
        let bytes: Arc<[u8]> = Arc::from(b"just some text, not pixels".to_vec());
        assert!(matches!(open(bytes), Err(CodecError::Unrecognized(_))));
    }

    #[test]
    fn bmp_falls_back_to_content_guess() {
        let image = open(encode(&gradient(12, 9), ImageFormat::Bmp)).unwrap();
        assert_eq!(image.info().format, SourceFormat::Bmp);
        assert_eq!(RustCodec.decode(&image).unwrap().width(), 12);
    }

    #[test]
    fn tiff_is_named_by_content_guess() {
        let image = open(encode(&gradient(12, 9), ImageFormat::Tiff)).unwrap();
        assert_eq!(image.info().format, SourceFormat::Tiff);
        assert_eq!(RustCodec.decode(&image).unwrap().height(), 9);
    }

    #[test]
    fn jpeg_scaled_decode_halves_and_quarters() {
        let image = open(encode(&gradient(400, 300), ImageFormat::Jpeg)).unwrap();
        let half = RustCodec.decode_jpeg_scaled(&image, JpegScale::Half).unwrap();
        assert_eq!((half.width(), half.height()), (200, 150));
        let quarter = RustCodec
            .decode_jpeg_scaled(&image, JpegScale::Quarter)
            .unwrap();
        assert_eq!((quarter.width(), quarter.height()), (100, 75));
    }

    #[test]
    fn scaled_decode_rejects_non_jpeg() {
        let image = open(encode(&gradient(8, 8), ImageFormat::Png)).unwrap();
        assert!(RustCodec.decode_jpeg_scaled(&image, JpegScale::Half).is_err());
    }

    #[test]
    fn resize_is_exact() {
        let resized = RustCodec
            .resize(&gradient(100, 50), 33, 17, Interpolation::Bicubic)
            .unwrap();
        assert_eq!((resized.width(), resized.height()), (33, 17));
    }

    #[test]
    fn resize_to_zero_is_error() {
        assert!(
            RustCodec
                .resize(&gradient(4, 4), 0, 4, Interpolation::Lanczos)
                .is_err()
        );
    }

    #[test]
    fn gif_frames_iterate_with_delays() {
        let image = open(animated_gif(3)).unwrap();
        assert_eq!(image.info().frame_count, 3);
        assert_eq!(image.info().frame_delay_ms, Some(60));
        assert_eq!(image.info().color_mode, ColorMode::Palette);

        let frames: Vec<_> = RustCodec
            .frames(&image)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.delay_ms == Some(60)));
        assert_eq!(frames[0].image.width(), 8);
    }
}
