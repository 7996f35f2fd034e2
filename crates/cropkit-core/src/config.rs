//! Pipeline configuration.
//!
//! Deserializable from camelCase JSON / JS objects; every field has a
//! default, so `{}` is a valid configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

use crate::encode::{CompressionConfig, OutputFormat};
use crate::render::Filter;

/// Reasons a [`PipelineConfig`] is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Pixel density must be positive and finite, got {0}")]
    InvalidPixelDensity(f64),

    #[error("Initial crop percent must be in (0, 100], got {0}")]
    InvalidInitialCrop(f64),

    #[error("Aspect ratio must be positive and finite, got {0}")]
    InvalidAspect(f64),

    #[error("JPEG quality must be in 1-100, got {0}")]
    InvalidQuality(u8),

    #[error("Compression minimum quality {min} exceeds initial quality {initial}")]
    InvertedQualityRange { min: u8, initial: u8 },

    #[error("Downscale factor must be in (0, 1), got {0}")]
    InvalidDownscaleFactor(f64),

    #[error("Display box must be non-zero, got {width}x{height}")]
    InvalidDisplayBox { width: u32, height: u32 },
}

/// Layout box the decoded bitmap is fitted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayBox {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayBox {
    fn default() -> Self {
        Self {
            width: 552,
            height: 552,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Delay between an update and its render, in milliseconds.
    pub debounce_ms: u64,
    /// Width of the initial crop, in percent of the displayed width.
    pub initial_crop_percent: f64,
    /// Aspect (width / height) for the initial region when none is locked.
    pub default_aspect: f64,
    /// Device pixel density.
    pub pixel_density: f64,
    pub preview_filter: Filter,
    pub export_filter: Filter,
    pub output: OutputFormat,
    /// Optional recompression applied on confirm.
    pub compression: Option<CompressionConfig>,
    pub display_box: DisplayBox,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            initial_crop_percent: 70.0,
            default_aspect: 20.0 / 15.0,
            pixel_density: 1.0,
            preview_filter: Filter::Bilinear,
            export_filter: Filter::Lanczos3,
            output: OutputFormat::Png,
            compression: None,
            display_box: DisplayBox::default(),
        }
    }
}

impl PipelineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Check every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pixel_density.is_finite() && self.pixel_density > 0.0) {
            return Err(ConfigError::InvalidPixelDensity(self.pixel_density));
        }
        let pct = self.initial_crop_percent;
        if !(pct.is_finite() && pct > 0.0 && pct <= 100.0) {
            return Err(ConfigError::InvalidInitialCrop(pct));
        }
        if !(self.default_aspect.is_finite() && self.default_aspect > 0.0) {
            return Err(ConfigError::InvalidAspect(self.default_aspect));
        }
        if let OutputFormat::Jpeg { quality } = self.output {
            check_quality(quality)?;
        }
        if let Some(c) = &self.compression {
            check_quality(c.initial_quality)?;
            check_quality(c.min_quality)?;
            if c.min_quality > c.initial_quality {
                return Err(ConfigError::InvertedQualityRange {
                    min: c.min_quality,
                    initial: c.initial_quality,
                });
            }
            if !(c.downscale_factor > 0.0 && c.downscale_factor < 1.0) {
                return Err(ConfigError::InvalidDownscaleFactor(c.downscale_factor));
            }
        }
        let DisplayBox { width, height } = self.display_box;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDisplayBox { width, height });
        }
        Ok(())
    }
}

fn check_quality(quality: u8) -> Result<(), ConfigError> {
    if (1..=100).contains(&quality) {
        Ok(())
    } else {
        Err(ConfigError::InvalidQuality(quality))
    }
}
