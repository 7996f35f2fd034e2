//! Decoding user-selected files into [`SourceImage`]s.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageFormat};

use super::{DisplaySize, LoadError, Orientation, SourceFormat, SourceImage};

/// Decode a JPEG or PNG file and lay it out inside a display box.
///
/// The natural size is the decoded (orientation-corrected) size; the displayed
/// size is the natural size fitted into `max_width` x `max_height`.
///
/// # Errors
///
/// Returns `LoadError::Empty` for empty input, `LoadError::UnsupportedFormat`
/// when the bytes are not JPEG or PNG, and `LoadError::CorruptedFile` when the
/// decoder rejects them.
pub fn load_image(bytes: &[u8], max_width: u32, max_height: u32) -> Result<SourceImage, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }

    let format = sniff_format(bytes)?;

    let orientation = match format {
        SourceFormat::Jpeg => extract_orientation(bytes),
        SourceFormat::Png => Orientation::Normal,
    };

    let image_format = match format {
        SourceFormat::Jpeg => ImageFormat::Jpeg,
        SourceFormat::Png => ImageFormat::Png,
    };
    let decoded = image::load_from_memory_with_format(bytes, image_format)
        .map_err(|e| LoadError::CorruptedFile(e.to_string()))?;

    let rgba = apply_orientation(decoded, orientation).into_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::ZeroSized { width, height });
    }

    let displayed = DisplaySize::fit(width, height, max_width, max_height);
    log::debug!(
        "loaded {:?} source {}x{} displayed at {:.1}x{:.1} ({:?})",
        format,
        width,
        height,
        displayed.width,
        displayed.height,
        orientation
    );

    Ok(SourceImage::from_rgba(rgba, format, displayed)?.with_orientation(orientation))
}

/// Identify the container from its magic bytes.
fn sniff_format(bytes: &[u8]) -> Result<SourceFormat, LoadError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok(SourceFormat::Jpeg),
        Ok(ImageFormat::Png) => Ok(SourceFormat::Png),
        _ => Err(LoadError::UnsupportedFormat),
    }
}

/// Read the EXIF orientation tag, defaulting to `Normal`.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Rotate/flip so the pixels match what a browser shows for the file.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
