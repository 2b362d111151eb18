//! Per-image view state: zoom level with its cap, and rotation.
//!
//! Every mutator reports whether anything changed. Callers only resize when
//! something did, so key-repeat events with no net effect cost nothing.

use crate::imaging::Rotation;

/// Highest zoom level allowed before a size limit is discovered.
pub const DEFAULT_ZOOM_CAP: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Zoom level bounded by `0..=cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomState {
    level: u32,
    cap: u32,
    default_cap: u32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM_CAP)
    }
}

impl ZoomState {
    pub fn new(default_cap: u32) -> Self {
        Self {
            level: 0,
            cap: default_cap,
            default_cap,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Step one level. `None` is "no zoom requested" and never changes state.
    pub fn try_zoom(&mut self, direction: Option<ZoomDirection>) -> bool {
        match direction {
            Some(ZoomDirection::In) if self.level < self.cap => {
                self.level += 1;
                true
            }
            Some(ZoomDirection::Out) if self.level > 0 => {
                self.level -= 1;
                true
            }
            _ => false,
        }
    }

    /// Undo a zoom-in whose bitmap could not be produced.
    pub fn roll_back(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Forbid zooming past the current level until [`reset`](Self::reset).
    pub fn hit_cap(&mut self) {
        self.cap = self.level;
    }

    pub fn reset(&mut self) {
        self.level = 0;
        self.cap = self.default_cap;
    }
}

/// One of four quarter-turn orientations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationState {
    orientation: Rotation,
}

impl RotationState {
    pub fn orientation(&self) -> Rotation {
        self.orientation
    }

    /// Set the orientation; `None` or the current value is a no-op.
    pub fn try_rotate(&mut self, target: Option<Rotation>) -> bool {
        match target {
            Some(target) if target != self.orientation => {
                self.orientation = target;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.orientation = Rotation::Deg0;
    }
}

/// Zoom and rotation for the image on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoomModel {
    zoom: ZoomState,
    rotation: RotationState,
}

impl ZoomModel {
    pub fn new(default_cap: u32) -> Self {
        Self {
            zoom: ZoomState::new(default_cap),
            rotation: RotationState::default(),
        }
    }

    pub fn level(&self) -> u32 {
        self.zoom.level()
    }

    pub fn cap(&self) -> u32 {
        self.zoom.cap()
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation.orientation()
    }

    pub fn zoom(&mut self, direction: Option<ZoomDirection>) -> bool {
        self.zoom.try_zoom(direction)
    }

    pub fn rotate(&mut self, target: Option<Rotation>) -> bool {
        self.rotation.try_rotate(target)
    }

    /// Apply both requests. Both are always applied, even when the first
    /// changes state.
    pub fn apply(&mut self, direction: Option<ZoomDirection>, target: Option<Rotation>) -> bool {
        let zoomed = self.zoom(direction);
        let rotated = self.rotate(target);
        zoomed || rotated
    }

    pub fn roll_back(&mut self) {
        self.zoom.roll_back();
    }

    pub fn hit_cap(&mut self) {
        self.zoom.hit_cap();
    }

    pub fn reset(&mut self) {
        self.zoom.reset();
        self.rotation.reset();
    }
}
