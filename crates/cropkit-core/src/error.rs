//! Pipeline-level error taxonomy.
//!
//! Each concern (loading, encoding, compression) has its own error type next
//! to the code that produces it. This module folds them into the four
//! failure signals a crop dialog caller branches on, plus the two guards the
//! dialog itself enforces.

use thiserror::Error;

use crate::encode::{CompressError, EncodeError};
use crate::render::RenderError;
use crate::source::LoadError;

/// Failure signals surfaced by the crop pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The selected file could not be decoded. The user must reselect.
    #[error("Failed to decode source image: {0}")]
    DecodeFailed(#[from] LoadError),

    /// No completed crop exists yet, or the raster surface was never populated.
    #[error("No completed crop region to export")]
    RenderNotReady,

    /// The crop at the current zoom and pixel density is too large to render.
    #[error("Cropped image would be {width}x{height} pixels, which is too large")]
    OutputTooLarge { width: u32, height: u32 },

    /// The host reported an unusable on-screen size for the image.
    #[error("Invalid displayed size {width}x{height}")]
    InvalidDisplaySize { width: f64, height: f64 },

    /// Serializing the raster surface produced no data.
    #[error("Failed to encode cropped image: {0}")]
    EncodingFailed(#[from] EncodeError),

    /// The optional recompression post-pass failed.
    #[error("Failed to compress cropped image: {0}")]
    CompressionFailed(#[from] CompressError),

    /// Confirm was requested while the caller's upload is still in flight.
    #[error("An upload is already in progress")]
    UploadInFlight,

    /// The dialog was cancelled; its state has been discarded.
    #[error("Crop dialog is closed")]
    Closed,
}

impl From<RenderError> for PipelineError {
    /// A region that cannot produce a single output pixel is not a completed crop.
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::OutputTooLarge { width, height, .. } => {
                log::warn!("refusing to render {}x{} surface", width, height);
                PipelineError::OutputTooLarge { width, height }
            }
            err => {
                log::debug!("render not ready: {}", err);
                PipelineError::RenderNotReady
            }
        }
    }
}

impl PipelineError {
    /// Whether the user can recover without reselecting the file.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PipelineError::DecodeFailed(_) | PipelineError::Closed)
    }
}
