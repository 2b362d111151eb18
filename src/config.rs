//! Viewer configuration module.
//!
//! Handles loading, validating, and merging a `config.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [viewport]
//! width = 1920              # Display area the fit is computed for
//! height = 1080
//!
//! [cache]
//! max_items = 20            # Fitted bitmaps kept in memory (0 disables)
//!
//! [zoom]
//! max_level = 64            # Zoom cap before any size limit is found
//! growth = 1.4              # Size multiplier per zoom level
//! aspect_divisor = 6        # Extreme aspect ratios zoom faster; lower = faster
//! max_dimension = 65535     # Largest zoomed bitmap axis, in pixels
//!
//! [animation]
//! default_delay_ms = 100    # Frame delay when a file declares none
//! backoff_factor = 1.4      # Retry growth while frames are still loading
//! max_backoff_ms = 1000     # Longest retry wait
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::animation::AnimationTiming;
use crate::imaging::{Viewport, ZoomTuning};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Viewer configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub viewport: ViewportConfig,
    pub cache: CacheConfig,
    pub zoom: ZoomConfig,
    pub animation: AnimationConfig,
}

impl ViewerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Validation(
                "viewport width and height must be non-zero".into(),
            ));
        }
        if !(self.zoom.growth > 1.0 && self.zoom.growth.is_finite()) {
            return Err(ConfigError::Validation(
                "zoom.growth must be greater than 1.0".into(),
            ));
        }
        if self.zoom.aspect_divisor == 0 {
            return Err(ConfigError::Validation(
                "zoom.aspect_divisor must be at least 1".into(),
            ));
        }
        if self.zoom.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "zoom.max_dimension must be at least 1".into(),
            ));
        }
        if self.animation.default_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "animation.default_delay_ms must be at least 1".into(),
            ));
        }
        if !(self.animation.backoff_factor > 1.0 && self.animation.backoff_factor.is_finite()) {
            return Err(ConfigError::Validation(
                "animation.backoff_factor must be greater than 1.0".into(),
            ));
        }
        if self.animation.max_backoff_ms < self.animation.default_delay_ms {
            return Err(ConfigError::Validation(
                "animation.max_backoff_ms must not be below animation.default_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport.width, self.viewport.height)
    }

    pub fn zoom_tuning(&self) -> ZoomTuning {
        ZoomTuning {
            growth: self.zoom.growth,
            aspect_divisor: self.zoom.aspect_divisor,
            max_dimension: self.zoom.max_dimension,
        }
    }

    pub fn animation_timing(&self) -> AnimationTiming {
        AnimationTiming {
            default_delay_ms: self.animation.default_delay_ms,
            backoff_factor: self.animation.backoff_factor,
            max_backoff_ms: self.animation.max_backoff_ms,
        }
    }
}

/// Display area bitmaps are fitted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Fitted-bitmap cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Entries kept; 0 disables caching.
    pub max_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_items: 20 }
    }
}

/// Zoom curve and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoomConfig {
    pub max_level: u32,
    pub growth: f64,
    pub aspect_divisor: u32,
    pub max_dimension: u32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        let tuning = ZoomTuning::default();
        Self {
            max_level: crate::state::DEFAULT_ZOOM_CAP,
            growth: tuning.growth,
            aspect_divisor: tuning.aspect_divisor,
            max_dimension: tuning.max_dimension,
        }
    }
}

/// Animation playback timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationConfig {
    pub default_delay_ms: u32,
    pub backoff_factor: f64,
    pub max_backoff_ms: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        let timing = AnimationTiming::default();
        Self {
            default_delay_ms: timing.default_delay_ms,
            backoff_factor: timing.backoff_factor,
            max_backoff_ms: timing.max_backoff_ms,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ViewerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge user values onto stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ViewerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ViewerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// A missing file yields the stock defaults.
pub fn load_config(dir: &Path) -> Result<ViewerConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# fitview configuration
# =====================
# Every key is optional; delete what you do not want to change.

[viewport]
# Display area, in pixels, that images are fitted to.
width = 1920
height = 1080

[cache]
# Screen-fitted bitmaps kept in memory, most recently viewed first.
# A cached bitmap is reused while the file keeps the same byte size.
# 0 disables the cache.
max_items = 20

[zoom]
# Zoom level ceiling. Lower caps are discovered per image when a level
# would be too large to create or zoomed in past twice the viewport.
max_level = 64
# Each zoom level multiplies the fitted size by this factor.
growth = 1.4
# Very wide or very tall images zoom faster: the integer aspect ratio
# divided by this number is added to the multiplier.
aspect_divisor = 6
# Largest width or height of a zoomed bitmap.
max_dimension = 65535

[animation]
# Delay for frames that declare none (or 0-1 ms).
default_delay_ms = 100
# While the next frame is still decoding, each retry waits this much
# longer than the one before...
backoff_factor = 1.4
# ...up to this many milliseconds.
max_backoff_ms = 1000
"##
}
