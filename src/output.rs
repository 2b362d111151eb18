//! Text formatting for image details and the headless binary.
//!
//! # Details Display
//!
//! The details overlay and `fitview fit` share one layout: the file name as
//! a header, then indented facts about the *source*, never the fitted
//! bitmap.
//!
//! ```text
//! sunset.jpg
//!     Size: 4000 x 3000
//!     File: 2.4 MB
//!     Format: JPEG (RGB)
//! ```
//!
//! Animations add a `Frames:` line; undecodable files add `Placeholder: yes`.
//!
//! ## Zoom
//!
//! ```text
//! level 0: 1440 x 1080
//! level 1: 2016 x 1512
//! level 3: 3951 x 2964 (cap)
//! ```
//!
//! ## Frames
//!
//! ```text
//! frame 001: 480 x 360, 70 ms
//! frame 002: 480 x 360, 100 ms
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::imaging::Rotation;
use crate::loader::ImageDetails;
use serde::Serialize;

// ============================================================================
// Shared helpers
// ============================================================================

/// Human-readable file size in decimal units, one decimal place, truncated.
///
/// ```text
/// 999 B
/// 1.5 KB
/// 2.4 MB
/// ```
pub fn format_byte_size(bytes: u64) -> String {
    if bytes >= 1_000_000 {
        let whole = bytes / 1_000_000;
        let frac = (bytes % 1_000_000) / 100_000;
        format!("{whole}.{frac} MB")
    } else if bytes >= 1_000 {
        let whole = bytes / 1_000;
        let frac = (bytes % 1_000) / 100;
        format!("{whole}.{frac} KB")
    } else {
        format!("{bytes} B")
    }
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dimensions(width: u32, height: u32) -> String {
    format!("{width} x {height}")
}

// ============================================================================
// Details
// ============================================================================

pub fn format_details(details: &ImageDetails) -> Vec<String> {
    let name = details
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| details.path.display().to_string());

    let mut lines = vec![name];
    lines.push(format!(
        "{}Size: {}",
        indent(1),
        dimensions(details.width, details.height)
    ));
    lines.push(format!("{}File: {}", indent(1), details.display_size));
    lines.push(format!(
        "{}Format: {} ({})",
        indent(1),
        details.format,
        details.color_mode
    ));
    if details.frame_count > 1 {
        lines.push(format!("{}Frames: {}", indent(1), details.frame_count));
    }
    if details.placeholder {
        lines.push(format!("{}Placeholder: yes", indent(1)));
    }
    lines
}

pub fn print_details(details: &ImageDetails) {
    for line in format_details(details) {
        println!("{}", line);
    }
}

// ============================================================================
// Zoom
// ============================================================================

/// One zoom level as shown by `fitview zoom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoomReport {
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    /// Zoom cannot go past this level.
    pub capped: bool,
}

pub fn format_zoom_report(rows: &[ZoomReport]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let mut line = format!("level {}: {}", row.level, dimensions(row.width, row.height));
            if row.rotation != Rotation::Deg0 {
                line.push_str(&format!(", rotated {}", row.rotation.degrees()));
            }
            if row.capped {
                line.push_str(" (cap)");
            }
            line
        })
        .collect()
}

pub fn print_zoom_report(rows: &[ZoomReport]) {
    for line in format_zoom_report(rows) {
        println!("{}", line);
    }
}

// ============================================================================
// Frames
// ============================================================================

/// One animation frame as shown by `fitview frames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    /// 1-based.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub delay_ms: u32,
}

pub fn format_frame_report(frames: &[FrameReport]) -> Vec<String> {
    frames
        .iter()
        .map(|f| {
            format!(
                "frame {}: {}, {} ms",
                format_index(f.index),
                dimensions(f.width, f.height),
                f.delay_ms
            )
        })
        .collect()
}

pub fn print_frame_report(frames: &[FrameReport]) {
    for line in format_frame_report(frames) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
