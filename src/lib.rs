//! # fitview
//!
//! The image pipeline behind a full-screen image viewer: fit to screen,
//! step-wise zoom, quarter-turn rotation, a recently-viewed bitmap cache and
//! background animation frame loading.
//!
//! There is no window here. A UI owns the event loop and draws the
//! [`Bitmap`](imaging::Bitmap)s this crate hands out; a file manager decides
//! which path to load next. The bundled `fitview` binary drives the same API
//! headlessly and writes PNGs.
//!
//! # Architecture: One Loader, Three Workers
//!
//! ```text
//!              ┌──────────────┐
//!   path ────▶ │ ImageLoader  │ ───▶ Bitmap
//!              └──────┬───────┘
//!        ┌────────────┼──────────────┐
//!        ▼            ▼              ▼
//!   ImageCache     Resizer    AnimationRunner ──▶ worker thread
//!                     │                               │
//!                     └───────── Codec ◀──────────────┘
//! ```
//!
//! - The **loader** reads the file, checks the cache, asks the resizer for a
//!   screen fit, and starts the animation runner for multi-frame images.
//! - The **resizer** holds every resolution decision; the codec only decodes
//!   and resamples what it is told to.
//! - The **runner** fits frames 1.. on a background thread and publishes
//!   them into write-once slots the foreground polls without locks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`loader`] | Orchestrator: load, zoom/rotate, frame polling, image details |
//! | [`imaging`] | Size calculations, the codec seam, the production codec, resizing |
//! | [`cache`] | LRU of screen-fitted bitmaps with size-based freshness |
//! | [`state`] | Zoom level/cap and rotation state machines |
//! | [`animation`] | Background frame loading and the foreground retry timer |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | Text formatting for details and the binary's reports |
//!
//! # Design Decisions
//!
//! ## Resolution Before Quality
//!
//! Most photos are far larger than the screen. Fitting decodes JPEGs at 1/2
//! or 1/4 scale straight from the DCT and halves other formats with a cheap
//! filter, so the expensive filter only ever runs on an image at most twice
//! the screen size.
//!
//! ## Zoom Fails Soft
//!
//! A zoom level that would be too large to allocate is not an error. The
//! level rolls back and becomes the cap until the next image is loaded.
//!
//! ## Pure-Rust Decoding
//!
//! Decoding uses the `image` crate, `jpeg-decoder` for scaled JPEG decode and
//! `rav1d` for AVIF. No system libraries, no `pkg-config`.

pub mod animation;
pub mod cache;
pub mod config;
pub mod imaging;
pub mod loader;
pub mod output;
pub mod state;
