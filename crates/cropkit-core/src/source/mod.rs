//! Source image loading.
//!
//! A source image is the decoded, user-selected file. It records two sizes:
//! - **natural**: the full-resolution pixel size after EXIF orientation
//! - **displayed**: the size the bitmap occupies on screen, which the crop
//!   region is expressed against
//!
//! Only JPEG and PNG are accepted.

mod load;
mod types;

pub use load::load_image;
pub use types::{DisplaySize, LoadError, Orientation, SourceFormat, SourceImage};
