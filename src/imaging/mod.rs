//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff / probe** | magic bytes + container scanners |
//! | **Decode** | `image` decoders, `avif-parse` + `rav1d` for AVIF |
//! | **Fast JPEG shrink** | `jpeg-decoder` DCT scaling (1/2, 1/4) |
//! | **Resize** | `resize_exact` with a filter chosen per resize |
//! | **Frames** | `image::AnimationDecoder` (GIF, WebP, APNG) |
//!
//! The module is split into:
//! - **Calculations**: pure fit and zoom geometry (unit testable)
//! - **Parameters**: viewport, filters, rotation, zoom tuning
//! - **Codec**: [`Codec`] trait + [`RustCodec`]
//! - **Container**: format sniffing and frame counting without decoding
//! - **Resizer**: high-level operations combining calculations + codec
//! - **Placeholder**: bitmaps standing in for files that failed to decode

mod bitmap;
mod calculations;
pub mod codec;
mod container;
mod params;
pub mod placeholder;
mod resizer;
pub mod rust_codec;

pub use bitmap::Bitmap;
pub use calculations::{
    FitPlan, Oversize, ZoomPlan, choose_interpolation, plan_fit, plan_zoom, zoom_factor,
};
pub use codec::{Codec, CodecError, ColorMode, DecodedImage, ImageInfo, RawFrame, SourceFormat};
pub use container::{AnimationInfo, probe_animation, sniff_format};
pub use params::{Interpolation, JpegScale, Rotation, Viewport, ZoomTuning};
pub use placeholder::placeholder;
pub use resizer::{Fitted, ResizeError, Resizer, Zoomed};
pub use rust_codec::RustCodec;
