//! Serializing rendered surfaces to upload-ready bytes.
//!
//! PNG keeps the alpha channel (transparent corners from rotation or an
//! elliptical mask survive). JPEG has no alpha, so pixels are composited
//! onto white first.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::Raster;

/// Errors that can occur while encoding a surface.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The codec reported an error
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// The codec finished without writing any bytes
    #[error("Encoder produced no data")]
    EmptyOutput,
}

/// Output container for exported crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// The encoded image handed to the upload callback.
///
/// Produced once per export and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl OutputArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode a rendered surface.
///
/// # Errors
///
/// Returns `EncodeError::EmptyOutput` if the codec wrote nothing, or the
/// codec's own failure as `EncodeError::EncodingFailed`.
pub fn encode_raster(raster: &Raster, format: OutputFormat) -> Result<OutputArtifact, EncodeError> {
    encode_rgba(raster.pixels(), format)
}

/// Encode RGBA pixels in the requested format.
///
/// JPEG quality is clamped to 1-100.
///
/// # Errors
///
/// See [`EncodeError`].
pub fn encode_rgba(image: &RgbaImage, format: OutputFormat) -> Result<OutputArtifact, EncodeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = (width as usize) * (height as usize) * 4;
    if image.as_raw().len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.as_raw().len(),
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    match format {
        OutputFormat::Png => PngEncoder::new(&mut buffer)
            .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?,
        OutputFormat::Jpeg { quality } => {
            let rgb = flatten_onto_white(image);
            JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?
        }
    }

    let bytes = buffer.into_inner();
    if bytes.is_empty() {
        return Err(EncodeError::EmptyOutput);
    }

    Ok(OutputArtifact {
        bytes,
        format,
        width,
        height,
    })
}

/// Composite straight-alpha RGBA over an opaque white background.
fn flatten_onto_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.as_raw().len() / 4 * 3);
    for p in image.pixels() {
        let [r, g, b, a] = p.0;
        let a = a as u32;
        for c in [r, g, b] {
            rgb.push(((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
        }
    }
    rgb
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: PNG export is lossless for any RGBA content.
        #[test]
        fn prop_png_is_lossless(
            (width, height) in (1u32..=16, 1u32..=16),
            seed in any::<u32>(),
        ) {
            let img = RgbaImage::from_fn(width, height, |x, y| {
                let v = seed.wrapping_mul(31).wrapping_add(x * 17 + y * 101);
                image::Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
            });
            let artifact = encode_rgba(&img, OutputFormat::Png).unwrap();
            let decoded = image::load_from_memory(artifact.bytes()).unwrap().into_rgba8();
            prop_assert_eq!(decoded, img);
        }

        /// Property: JPEG export always yields a non-empty, well-delimited stream.
        #[test]
        fn prop_jpeg_valid(
            (width, height) in (1u32..=24, 1u32..=24),
            quality in 1u8..=100,
        ) {
            let img = RgbaImage::from_pixel(width, height, image::Rgba([90, 120, 150, 200]));
            let artifact = encode_rgba(&img, OutputFormat::Jpeg { quality }).unwrap();
            prop_assert!(!artifact.is_empty());
            prop_assert_eq!(&artifact.bytes()[0..2], &[0xFF, 0xD8]);
        }
    }
}
