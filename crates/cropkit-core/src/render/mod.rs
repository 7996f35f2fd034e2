//! Crop rendering: (source, region, transform) -> raster surface.
//!
//! # Algorithm
//!
//! [`RenderPlan`] sizes the output at full source resolution
//! (`region * natural/displayed * pixel density`) and composes the affine
//! matrix that places the rotated, zoomed source under the crop window.
//! [`render`] then fills every output pixel by mapping its centre back
//! through the inverse matrix and interpolating the source there.
//!
//! Identity transforms at integer offsets reproduce the source pixels
//! exactly, so rendering is a strict generalization of plain cropping.

mod plan;
mod raster;
mod sample;

pub use plan::{check_output_size, output_size, RenderError, RenderPlan, MAX_OUTPUT_PIXELS};
pub use raster::{render, CropShape, Raster};
pub use sample::Filter;
