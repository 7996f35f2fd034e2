//! Turning rendered surfaces into upload-ready artifacts.
//!
//! - [`encode_raster`] serializes a raster as PNG or JPEG.
//! - [`compress_to_ceiling`] is the optional post-pass that re-encodes as
//!   JPEG, lowering quality and then size, until a byte ceiling is met.

mod artifact;
mod compress;

pub use artifact::{encode_raster, encode_rgba, EncodeError, OutputArtifact, OutputFormat};
pub use compress::{compress_to_ceiling, CompressError, CompressionConfig};
