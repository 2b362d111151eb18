//! Container-level probing: magic-byte sniffing and frame counting.
//!
//! These parsers walk chunk and block structure only; they never touch
//! compressed pixel data. They exist so the loader can size an animation's
//! frame table before any frame is decoded. Every scanner is lenient: a
//! truncated or odd file yields whatever was counted up to that point
//! rather than an error, and the pixel decoder is left to report real
//! corruption.
//!
//! ## Layouts scanned
//!
//! - **GIF**: image descriptors (`0x2C`) and graphic control extensions
//!   (`0x21 0xF9`, delay in centiseconds).
//! - **WebP**: `ANMF` chunks inside the RIFF container (24-bit duration at
//!   payload offset 12).
//! - **APNG**: `fcTL` chunks (capped by the `acTL` count) and the first
//!   `fcTL` delay fraction.

use super::codec::SourceFormat;

/// Guess the container from the first bytes of a file.
///
/// Four-byte prefixes identify PNG, WebP, GIF and DDS; JPEG is identified by
/// its three-byte SOI marker. Anything else is assumed to be AVIF, whose
/// `ftyp` box does not sit at offset 0.
///
/// # Examples
/// ```
/// # use fitview::imaging::{sniff_format, SourceFormat};
/// assert_eq!(sniff_format(b"\x89PNG\r\n\x1a\n"), SourceFormat::Png);
/// assert_eq!(sniff_format(b"\xff\xd8\xff\xe0"), SourceFormat::Jpeg);
/// assert_eq!(sniff_format(b"????"), SourceFormat::Avif);
/// ```
pub fn sniff_format(bytes: &[u8]) -> SourceFormat {
    if bytes.starts_with(b"\x89PNG") {
        SourceFormat::Png
    } else if bytes.starts_with(b"RIFF") {
        SourceFormat::WebP
    } else if bytes.starts_with(b"GIF8") {
        SourceFormat::Gif
    } else if bytes.starts_with(b"DDS ") {
        SourceFormat::Dds
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        SourceFormat::Jpeg
    } else {
        SourceFormat::Avif
    }
}

/// Frame count and first-frame delay read from container structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationInfo {
    pub frame_count: usize,
    pub first_delay_ms: Option<u32>,
}

impl AnimationInfo {
    const STILL: Self = Self {
        frame_count: 1,
        first_delay_ms: None,
    };
}

/// Probe a file of a known format for animation facts.
///
/// Formats that cannot animate report a single frame.
pub fn probe_animation(format: SourceFormat, bytes: &[u8]) -> AnimationInfo {
    let info = match format {
        SourceFormat::Gif => scan_gif(bytes),
        SourceFormat::WebP => scan_webp(bytes),
        SourceFormat::Png => scan_apng(bytes),
        _ => AnimationInfo::STILL,
    };
    AnimationInfo {
        frame_count: info.frame_count.max(1),
        ..info
    }
}

/// Whether a PNG stores indexed color (IHDR color type 3).
pub fn png_is_palette(bytes: &[u8]) -> bool {
    bytes.get(25) == Some(&3)
}

fn u16_le(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn u16_be(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn u32_be(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

/// Skip a run of GIF data sub-blocks starting at `pos`; returns the offset
/// after the zero-length terminator.
fn skip_sub_blocks(bytes: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *bytes.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += len;
    }
}

fn scan_gif(bytes: &[u8]) -> AnimationInfo {
    let mut frames = 0usize;
    let mut first_delay = None;
    let mut pending_delay = None;

    // Header (6) + logical screen descriptor (7).
    let Some(&packed) = bytes.get(10) else {
        return AnimationInfo::STILL;
    };
    let mut pos = 13;
    if packed & 0x80 != 0 {
        pos += 3 * (1 << ((packed & 0x07) + 1));
    }

    while let Some(&block) = bytes.get(pos) {
        match block {
            0x21 => {
                let Some(&label) = bytes.get(pos + 1) else {
                    break;
                };
                if label == 0xF9 {
                    pending_delay = u16_le(bytes, pos + 4).map(|cs| cs as u32 * 10);
                }
                match skip_sub_blocks(bytes, pos + 2) {
                    Some(next) => pos = next,
                    None => break,
                }
            }
            0x2C => {
                frames += 1;
                if frames == 1 {
                    first_delay = pending_delay;
                }
                pending_delay = None;
                let Some(&image_packed) = bytes.get(pos + 9) else {
                    break;
                };
                pos += 10;
                if image_packed & 0x80 != 0 {
                    pos += 3 * (1 << ((image_packed & 0x07) + 1));
                }
                // LZW minimum code size, then the compressed sub-blocks.
                match skip_sub_blocks(bytes, pos + 1) {
                    Some(next) => pos = next,
                    None => break,
                }
            }
            _ => break,
        }
    }

    AnimationInfo {
        frame_count: frames,
        first_delay_ms: first_delay,
    }
}

fn scan_webp(bytes: &[u8]) -> AnimationInfo {
    if bytes.get(8..12) != Some(b"WEBP".as_slice()) {
        return AnimationInfo::STILL;
    }
    let mut frames = 0usize;
    let mut first_delay = None;
    let mut pos = 12;

    while let (Some(fourcc), Some(size)) = (bytes.get(pos..pos + 4), u32_le(bytes, pos + 4)) {
        let payload = pos + 8;
        if fourcc == b"ANMF" {
            frames += 1;
            if frames == 1 {
                first_delay = bytes
                    .get(payload + 12..payload + 15)
                    .map(|d| u32::from_le_bytes([d[0], d[1], d[2], 0]));
            }
        }
        // Chunks are padded to an even length.
        pos = payload + size as usize + (size as usize & 1);
    }

    if frames == 0 {
        return AnimationInfo::STILL;
    }
    AnimationInfo {
        frame_count: frames,
        first_delay_ms: first_delay,
    }
}

/// Frame count is the number of `fcTL` chunks actually present, capped by
/// the `acTL` declaration. A header alone never sizes the frame table.
fn scan_apng(bytes: &[u8]) -> AnimationInfo {
    let mut declared = None;
    let mut controls = 0usize;
    let mut first_delay = None;
    let mut pos = 8;

    while let (Some(len), Some(kind)) = (u32_be(bytes, pos), bytes.get(pos + 4..pos + 8)) {
        let data = pos + 8;
        match kind {
            b"acTL" => declared = u32_be(bytes, data).map(|n| n as usize),
            b"fcTL" => {
                controls += 1;
                if first_delay.is_none()
                    && let (Some(num), Some(den)) =
                        (u16_be(bytes, data + 20), u16_be(bytes, data + 22))
                {
                    let den = if den == 0 { 100 } else { den as u32 };
                    first_delay = Some(num as u32 * 1000 / den);
                }
            }
            b"IEND" => break,
            _ => {}
        }
        // length + type + data + crc
        pos = data.saturating_add(len as usize).saturating_add(4);
    }

    match declared {
        Some(declared) if controls > 0 => AnimationInfo {
            frame_count: declared.min(controls),
            first_delay_ms: first_delay,
        },
        _ => AnimationInfo::STILL,
    }
}
