//! Optional recompression under a size ceiling.
//!
//! Repeatedly re-encodes the surface as JPEG, first lowering the quality
//! and then shrinking the pixels, until the result fits `max_bytes`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::artifact::{encode_rgba, EncodeError, OutputArtifact, OutputFormat};
use crate::render::{Filter, Raster};

/// Errors from the recompression post-pass.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Every allowed attempt stayed above the ceiling.
    #[error(
        "Could not get below {max_bytes} bytes after {attempts} attempts \
         (smallest: {smallest} bytes)"
    )]
    CeilingNotReached {
        max_bytes: usize,
        attempts: u32,
        smallest: usize,
    },

    /// The downscale factor must lie strictly between 0 and 1.
    #[error("Invalid downscale factor: {0}")]
    InvalidDownscaleFactor(f64),

    /// An intermediate encode failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Settings for [`compress_to_ceiling`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionConfig {
    /// Upper bound for the encoded size.
    pub max_bytes: usize,
    /// JPEG quality of the first attempt (1-100).
    pub initial_quality: u8,
    /// Lowest JPEG quality tried before shrinking pixels.
    pub min_quality: u8,
    /// Quality decrement between attempts.
    pub quality_step: u8,
    /// Per-attempt size multiplier once the quality floor is reached.
    pub downscale_factor: f64,
    /// The long edge is never shrunk below this many pixels.
    pub min_edge: u32,
    /// Maximum number of encodes.
    pub max_attempts: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_bytes: 75 * 1024,
            initial_quality: 90,
            min_quality: 40,
            quality_step: 10,
            downscale_factor: 0.9,
            min_edge: 64,
            max_attempts: 20,
        }
    }
}

/// Re-encode `raster` as JPEG until it fits `config.max_bytes`.
///
/// # Errors
///
/// Returns `CompressError::CeilingNotReached` when the attempts run out or
/// the image would shrink below `min_edge`.
pub fn compress_to_ceiling(
    raster: &Raster,
    config: &CompressionConfig,
) -> Result<OutputArtifact, CompressError> {
    let factor = config.downscale_factor;
    if !(factor > 0.0 && factor < 1.0) {
        return Err(CompressError::InvalidDownscaleFactor(factor));
    }

    let mut quality = config.initial_quality.clamp(1, 100);
    let min_quality = config.min_quality.clamp(1, quality);
    let step = config.quality_step.max(1);

    let mut image: RgbaImage = raster.pixels().clone();
    let mut smallest = usize::MAX;
    let mut attempts = 0;

    while attempts < config.max_attempts {
        attempts += 1;
        let artifact = encode_rgba(&image, OutputFormat::Jpeg { quality })?;
        log::debug!(
            "compression attempt {}: {}x{} q{} -> {} bytes",
            attempts,
            image.width(),
            image.height(),
            quality,
            artifact.len()
        );
        if artifact.len() <= config.max_bytes {
            return Ok(artifact);
        }
        smallest = smallest.min(artifact.len());

        if quality > min_quality {
            quality = quality.saturating_sub(step).max(min_quality);
            continue;
        }

        let (w, h) = image.dimensions();
        let next_w = (w as f64 * factor).floor() as u32;
        let next_h = (h as f64 * factor).floor() as u32;
        if next_w == 0 || next_h == 0 || next_w.max(next_h) < config.min_edge {
            break;
        }
        image = image::imageops::resize(&image, next_w, next_h, Filter::Lanczos3.to_image_filter());
    }

    Err(CompressError::CeilingNotReached {
        max_bytes: config.max_bytes,
        attempts,
        smallest,
    })
}
