//! Background frame loading for animated images.
//!
//! Frame 0 is fitted synchronously by the loader and shown at once. The
//! remaining frames are decoded and fitted on one background thread and
//! published into a fixed-size table of write-once slots. The foreground
//! reads slots without locking and treats an empty slot as "not yet".
//!
//! # Cancellation
//!
//! Each [`AnimationRunner::begin`] and [`AnimationRunner::reset`] bumps a
//! shared generation counter. The worker compares it against the value it
//! was started with before every frame and stops as soon as they differ.
//! A superseded worker therefore writes nothing further; it keeps its own
//! `Arc` of the old table, which the foreground has already dropped.
//!
//! # Scheduling
//!
//! The UI owns the timer. [`FrameTimer`] computes how long to wait before
//! the next [`AnimationRunner::next_frame`] call, backing off while the
//! worker has not caught up.

use crate::imaging::{Bitmap, DecodedImage, Resizer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A fitted frame and how long it stays on screen.
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub bitmap: Bitmap,
    pub delay_ms: u32,
}

/// Frame delay defaults and retry backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationTiming {
    /// Used when a frame declares no delay, or one of 0 or 1 ms.
    pub default_delay_ms: u32,
    pub backoff_factor: f64,
    pub max_backoff_ms: u32,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            default_delay_ms: 100,
            backoff_factor: 1.4,
            max_backoff_ms: 1000,
        }
    }
}

impl AnimationTiming {
    /// Browsers treat 0 and 1 ms frame delays as "unspecified"; so do we.
    pub fn normalize_delay(&self, delay_ms: Option<u32>) -> u32 {
        match delay_ms {
            Some(ms) if ms > 1 => ms,
            _ => self.default_delay_ms,
        }
    }
}

type FrameTable = Arc<[OnceLock<AnimationFrame>]>;

/// Owns the frame table and the background worker for one animation.
pub struct AnimationRunner {
    resizer: Resizer,
    timing: AnimationTiming,
    frames: FrameTable,
    cursor: Option<usize>,
    generation: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl AnimationRunner {
    pub fn new(resizer: Resizer, timing: AnimationTiming) -> Self {
        Self {
            resizer,
            timing,
            frames: Arc::from(Vec::new()),
            cursor: None,
            generation: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    pub fn timing(&self) -> AnimationTiming {
        self.timing
    }

    /// Current session id. Increases on every begin and reset.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the frame last returned by [`next_frame`](Self::next_frame).
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Slots filled so far, frame 0 included.
    pub fn loaded_count(&self) -> usize {
        self.frames.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Start a new animation session.
    ///
    /// `first` is the already fitted frame 0, available from
    /// [`next_frame`](Self::next_frame) as soon as this returns. Frames
    /// `1..frame_count` are loaded in order on a background thread.
    pub fn begin(
        &mut self,
        image: DecodedImage,
        first: Bitmap,
        first_delay_ms: Option<u32>,
        frame_count: usize,
    ) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let frames: FrameTable = (0..frame_count.max(1)).map(|_| OnceLock::new()).collect();
        let _ = frames[0].set(AnimationFrame {
            bitmap: first,
            delay_ms: self.timing.normalize_delay(first_delay_ms),
        });
        self.frames = frames.clone();
        self.cursor = None;

        if frame_count <= 1 {
            return;
        }

        let resizer = self.resizer.clone();
        let timing = self.timing;
        let current = Arc::clone(&self.generation);
        let spawned = std::thread::Builder::new()
            .name(format!("fitview-frames-{generation}"))
            .spawn(move || {
                load_frames(&resizer, &image, &frames, timing, &current, generation);
            });

        match spawned {
            Ok(handle) => {
                debug!(generation, frame_count, "animation loader started");
                self.worker = Some(handle);
            }
            Err(e) => warn!(error = %e, "could not start animation loader; showing first frame only"),
        }
    }

    /// Advance to the next loaded frame, cycling.
    ///
    /// Returns `None` without moving when the next slot is not loaded yet,
    /// or when no animation is active.
    pub fn next_frame(&mut self) -> Option<AnimationFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => 0,
            Some(current) => (current + 1) % self.frames.len(),
        };
        let frame = self.frames[next].get()?.clone();
        self.cursor = Some(next);
        Some(frame)
    }

    /// Stop the current session. Safe with no animation active.
    pub fn reset(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.frames = Arc::from(Vec::new());
        self.cursor = None;
        // The superseded worker exits on its next generation check.
        self.worker = None;
    }

    /// Block until the current worker has finished or given up.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            warn!("animation loader panicked");
        }
    }
}

/// Worker body: decode, fit and publish frames `1..` in order.
fn load_frames(
    resizer: &Resizer,
    image: &DecodedImage,
    frames: &[OnceLock<AnimationFrame>],
    timing: AnimationTiming,
    current: &AtomicU64,
    generation: u64,
) {
    let codec = resizer.codec();
    let mut decoded = match codec.frames(image) {
        Ok(iter) => iter,
        Err(e) => {
            warn!(error = %e, "cannot iterate animation frames");
            return;
        }
    };

    for (index, slot) in frames.iter().enumerate() {
        if current.load(Ordering::Acquire) != generation {
            debug!(generation, index, "animation superseded");
            return;
        }
        let Some(raw) = decoded.next() else {
            debug!(generation, index, "animation ended early");
            return;
        };
        if index == 0 {
            continue;
        }

        match raw.map_err(Into::into).and_then(|raw| {
            resizer.fit_frame(&raw.image).map(|bitmap| AnimationFrame {
                bitmap,
                delay_ms: timing.normalize_delay(raw.delay_ms),
            })
        }) {
            Ok(frame) => {
                trace!(generation, index, "frame ready");
                let _ = slot.set(frame);
            }
            // The slot stays empty; playback skips nothing, it just waits.
            Err(e) => debug!(generation, index, error = %e, "frame failed"),
        }
    }
}

/// Foreground retry schedule for animation playback.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    timing: AnimationTiming,
    backoff_ms: u32,
}

impl FrameTimer {
    /// Timer for an animation whose first frame shows for `first_delay_ms`.
    pub fn new(timing: AnimationTiming, first_delay_ms: u32) -> Self {
        Self {
            timing,
            backoff_ms: (first_delay_ms + 50).min(timing.max_backoff_ms.max(1)),
        }
    }

    pub fn backoff_ms(&self) -> u32 {
        self.backoff_ms
    }

    /// Milliseconds until the next tick.
    ///
    /// After a shown frame: its delay minus the time spent showing it, at
    /// least 1. After a miss: the current backoff, which then grows.
    pub fn next_delay(&mut self, frame: Option<&AnimationFrame>, elapsed: Duration) -> u32 {
        match frame {
            Some(frame) => {
                let elapsed = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
                frame.delay_ms.saturating_sub(elapsed).max(1)
            }
            None => {
                let wait = self.backoff_ms;
                let grown = (wait as f64 * self.timing.backoff_factor).round() as u32;
                self.backoff_ms = grown.clamp(wait, self.timing.max_backoff_ms.max(wait));
                wait
            }
        }
    }
}
