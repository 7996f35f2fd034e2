//! Core types for loaded source images.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for source image loading.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file contained no bytes.
    #[error("Empty image file")]
    Empty,

    /// The file is neither a JPEG nor a PNG.
    #[error("Invalid or unsupported image format")]
    UnsupportedFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The decoded image has a zero dimension.
    #[error("Image has no pixels ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },

    /// The on-screen size is zero, negative or not finite.
    #[error("Invalid displayed size {width}x{height}")]
    InvalidDisplaySize { width: f64, height: f64 },
}

/// Container formats accepted by the crop dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Jpeg,
    Png,
}

impl SourceFormat {
    /// MIME type of the original file.
    pub fn mime_type(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    /// Flip horizontal + rotate 270 CW.
    Transpose = 5,
    Rotate90CW = 6,
    /// Flip horizontal + rotate 90 CW.
    Transverse = 7,
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// On-screen (layout) size of the source bitmap in CSS pixels.
///
/// Differs from the natural size whenever the bitmap is rendered inside a
/// constrained box, so it is fractional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Fit a natural size into a layout box, preserving aspect ratio.
    ///
    /// Images smaller than the box keep their natural size; they are never
    /// upscaled.
    pub fn fit(natural_width: u32, natural_height: u32, max_width: u32, max_height: u32) -> Self {
        if natural_width == 0 || natural_height == 0 {
            return Self::new(0.0, 0.0);
        }
        let w = natural_width as f64;
        let h = natural_height as f64;
        let ratio = (max_width as f64 / w).min(max_height as f64 / h).min(1.0);
        Self::new(w * ratio, h * ratio)
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A decoded, user-selected image ready for cropping.
///
/// The pixels never change after loading; only the displayed size can.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbaImage,
    format: SourceFormat,
    orientation: Orientation,
    displayed: DisplaySize,
}

impl SourceImage {
    /// Wrap already-decoded pixels.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::ZeroSized` for empty bitmaps and
    /// `LoadError::InvalidDisplaySize` for unusable layout sizes.
    pub fn from_rgba(
        pixels: RgbaImage,
        format: SourceFormat,
        displayed: DisplaySize,
    ) -> Result<Self, LoadError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(LoadError::ZeroSized { width, height });
        }
        if !displayed.is_valid() {
            return Err(LoadError::InvalidDisplaySize {
                width: displayed.width,
                height: displayed.height,
            });
        }
        Ok(Self {
            pixels,
            format,
            orientation: Orientation::Normal,
            displayed,
        })
    }

    pub(crate) fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Return a copy laid out at a different on-screen size.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDisplaySize` for zero, negative or
    /// non-finite sizes.
    pub fn with_displayed_size(mut self, displayed: DisplaySize) -> Result<Self, LoadError> {
        self.set_displayed_size(displayed)?;
        Ok(self)
    }

    /// Lay the image out at a different on-screen size in place.
    ///
    /// # Errors
    ///
    /// Same as [`with_displayed_size`](Self::with_displayed_size); the
    /// current size is kept on error.
    pub fn set_displayed_size(&mut self, displayed: DisplaySize) -> Result<(), LoadError> {
        if !displayed.is_valid() {
            return Err(LoadError::InvalidDisplaySize {
                width: displayed.width,
                height: displayed.height,
            });
        }
        self.displayed = displayed;
        Ok(())
    }

    /// Full-resolution width in pixels.
    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    /// Full-resolution height in pixels.
    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn displayed(&self) -> DisplaySize {
        self.displayed
    }

    /// Natural-to-displayed ratio along x.
    pub fn scale_x(&self) -> f64 {
        self.natural_width() as f64 / self.displayed.width
    }

    /// Natural-to-displayed ratio along y.
    pub fn scale_y(&self) -> f64 {
        self.natural_height() as f64 / self.displayed.height
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// EXIF orientation that was applied while loading.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
