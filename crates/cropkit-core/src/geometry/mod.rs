//! Crop geometry: regions, zoom/rotation state and affine matrices.
//!
//! # Coordinate System
//!
//! - Crop regions are expressed against the displayed image size, in percent
//!   (0-100) or displayed pixels
//! - Rotation is in degrees, positive = clockwise on screen
//! - Origin is the top-left corner, y points down

mod region;
mod transform;

pub use region::{fit_to_aspect, initial_crop, CropRegion, CropUnit};
pub use transform::{
    rotation_from_slider, scale_from_slider, slider_from_rotation, slider_from_scale, Affine,
    TransformState, MAX_ROTATION_DEGREES, MAX_SCALE, MIN_SCALE,
};
