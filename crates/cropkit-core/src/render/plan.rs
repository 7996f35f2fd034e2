//! Output sizing and the composed crop transform.

use thiserror::Error;

use crate::geometry::{Affine, CropRegion, TransformState};
use crate::source::SourceImage;

/// Errors that prevent a render from being planned.
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    /// The crop region has no area once clamped to the image.
    #[error("Crop region is empty")]
    EmptyRegion,

    /// The region is too small to produce a single output pixel.
    #[error("Output surface would be {width}x{height} pixels")]
    EmptyOutput { width: u32, height: u32 },

    /// Device pixel density must be positive and finite.
    #[error("Invalid pixel density: {0}")]
    InvalidPixelDensity(f64),

    /// The output surface would exceed [`MAX_OUTPUT_PIXELS`].
    #[error("Output surface of {width}x{height} pixels exceeds the {limit} pixel limit")]
    OutputTooLarge { width: u32, height: u32, limit: u64 },

    /// The composed transform cannot be inverted.
    #[error("Transform is not invertible")]
    SingularTransform,
}

/// Largest output surface a render may allocate (8192 x 8192).
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 26;

/// Tolerance absorbing float noise from percent/pixel round trips before flooring.
const FLOOR_TOLERANCE: f64 = 1e-6;

/// Everything needed to fill an output surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    /// Output width in physical pixels.
    pub width: u32,
    /// Output height in physical pixels.
    pub height: u32,
    /// The clamped region, in displayed pixels.
    pub region: CropRegion,
    /// Maps natural source coordinates to output coordinates.
    pub matrix: Affine,
    inverse: Affine,
}

impl RenderPlan {
    /// Plan the render of `region` over `source`.
    ///
    /// The matrix is built in the same order a 2D canvas context receives
    /// the calls, so points go through the last step first:
    /// 1. scale by device pixel density
    /// 2. translate by the negative crop origin (natural pixels)
    /// 3. translate to the natural image centre
    /// 4. rotate
    /// 5. scale by the zoom factor
    /// 6. translate back by the negative centre
    ///
    /// Rotation and zoom therefore pivot on the image centre regardless of
    /// where the crop sits.
    ///
    /// # Errors
    ///
    /// See [`RenderError`].
    pub fn new(
        source: &SourceImage,
        region: &CropRegion,
        transform: &TransformState,
        pixel_density: f64,
    ) -> Result<Self, RenderError> {
        if !(pixel_density.is_finite() && pixel_density > 0.0) {
            return Err(RenderError::InvalidPixelDensity(pixel_density));
        }

        let displayed = source.displayed();
        let region = region.to_pixels(displayed).clamp_to(displayed);
        if !region.has_area() {
            return Err(RenderError::EmptyRegion);
        }

        let (width, height) = output_size(source, &region, pixel_density);
        check_output_size(width, height)?;

        let crop_x = region.x * source.scale_x();
        let crop_y = region.y * source.scale_y();
        let center_x = source.natural_width() as f64 / 2.0;
        let center_y = source.natural_height() as f64 / 2.0;

        let matrix = Affine::IDENTITY
            .scale(pixel_density, pixel_density)
            .translate(-crop_x, -crop_y)
            .translate(center_x, center_y)
            .rotate(transform.rotation_degrees.to_radians())
            .scale(transform.scale, transform.scale)
            .translate(-center_x, -center_y);
        let inverse = matrix.invert().ok_or(RenderError::SingularTransform)?;

        Ok(Self {
            width,
            height,
            region,
            matrix,
            inverse,
        })
    }

    /// Source position sampled by output pixel `(x, y)`.
    #[inline]
    pub fn source_point(&self, x: u32, y: u32) -> (f64, f64) {
        self.inverse.apply(x as f64 + 0.5, y as f64 + 0.5)
    }
}

/// `floor(region * scale * density)` per axis.
pub fn output_size(source: &SourceImage, region: &CropRegion, pixel_density: f64) -> (u32, u32) {
    let px = region.to_pixels(source.displayed());
    let w = px.width * source.scale_x() * pixel_density;
    let h = px.height * source.scale_y() * pixel_density;
    (floor_px(w), floor_px(h))
}

/// Whether a `width` x `height` surface can be rendered.
///
/// # Errors
///
/// `EmptyOutput` when either side is zero, `OutputTooLarge` above
/// [`MAX_OUTPUT_PIXELS`].
pub fn check_output_size(width: u32, height: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyOutput { width, height });
    }
    if u64::from(width) * u64::from(height) > MAX_OUTPUT_PIXELS {
        return Err(RenderError::OutputTooLarge {
            width,
            height,
            limit: MAX_OUTPUT_PIXELS,
        });
    }
    Ok(())
}

fn floor_px(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value + FLOOR_TOLERANCE).floor().min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DisplaySize, SourceFormat};
    use image::RgbaImage;

    fn source(nw: u32, nh: u32, dw: f64, dh: f64) -> SourceImage {
        SourceImage::from_rgba(
            RgbaImage::new(nw, nh),
            SourceFormat::Png,
            DisplaySize::new(dw, dh),
        )
        .unwrap()
    }

    #[test]
    fn test_output_size_uses_natural_resolution() {
        let src = source(4000, 3000, 800.0, 600.0);
        let region = CropRegion::percent(15.0, 15.0, 70.0, 70.0);
        let plan = RenderPlan::new(&src, &region, &TransformState::default(), 1.0).unwrap();
        assert_eq!((plan.width, plan.height), (2800, 2100));
    }

    #[test]
    fn test_output_size_scales_with_density() {
        let src = source(400, 300, 200.0, 150.0);
        let region = CropRegion::pixels(10.0, 10.0, 50.0, 25.0);
        let plan = RenderPlan::new(&src, &region, &TransformState::default(), 2.0).unwrap();
        assert_eq!((plan.width, plan.height), (200, 100));
    }

    #[test]
    fn test_output_size_floors() {
        let src = source(100, 100, 100.0, 100.0);
        let region = CropRegion::pixels(0.0, 0.0, 10.7, 3.2);
        assert_eq!(output_size(&src, &region, 1.5), (16, 4));
    }

    #[test]
    fn test_identity_maps_output_to_crop_origin() {
        let src = source(100, 100, 50.0, 50.0);
        let region = CropRegion::pixels(10.0, 5.0, 20.0, 20.0);
        let plan = RenderPlan::new(&src, &region, &TransformState::default(), 1.0).unwrap();
        let (x, y) = plan.source_point(0, 0);
        assert!((x - 20.5).abs() < 1e-9);
        assert!((y - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_pivots_on_image_center() {
        let src = source(100, 60, 100.0, 60.0);
        let region = CropRegion::pixels(0.0, 0.0, 100.0, 60.0);
        let plan = RenderPlan::new(&src, &region, &TransformState::new(90.0, 1.0), 1.0).unwrap();
        let (cx, cy) = plan.matrix.apply(50.0, 30.0);
        assert!((cx - 50.0).abs() < 1e-9 && (cy - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_pivots_on_image_center() {
        let src = source(100, 100, 100.0, 100.0);
        let region = CropRegion::pixels(0.0, 0.0, 100.0, 100.0);
        let plan = RenderPlan::new(&src, &region, &TransformState::new(0.0, 2.0), 1.0).unwrap();
        let (x, y) = plan.matrix.apply(25.0, 25.0);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn test_empty_region_rejected() {
        let src = source(10, 10, 10.0, 10.0);
        let result = RenderPlan::new(
            &src,
            &CropRegion::pixels(20.0, 20.0, 5.0, 5.0),
            &TransformState::default(),
            1.0,
        );
        assert_eq!(result, Err(RenderError::EmptyRegion));
    }

    #[test]
    fn test_sub_pixel_region_rejected() {
        let src = source(10, 10, 10.0, 10.0);
        let result = RenderPlan::new(
            &src,
            &CropRegion::pixels(0.0, 0.0, 0.4, 5.0),
            &TransformState::default(),
            1.0,
        );
        assert!(matches!(result, Err(RenderError::EmptyOutput { .. })));
    }

    #[test]
    fn test_invalid_density_rejected() {
        let src = source(10, 10, 10.0, 10.0);
        let region = CropRegion::percent(0.0, 0.0, 100.0, 100.0);
        for density in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                RenderPlan::new(&src, &region, &TransformState::default(), density),
                Err(RenderError::InvalidPixelDensity(_))
            ));
        }
    }

    #[test]
    fn test_huge_density_rejected_before_allocation() {
        let src = source(1000, 500, 400.0, 200.0);
        let region = CropRegion::percent(0.0, 0.0, 100.0, 100.0);
        let result = RenderPlan::new(&src, &region, &TransformState::default(), 1e12);
        assert!(matches!(result, Err(RenderError::OutputTooLarge { .. })));
    }

    #[test]
    fn test_output_size_limit_boundary() {
        assert_eq!(check_output_size(8192, 8192), Ok(()));
        assert!(matches!(
            check_output_size(8192, 8193),
            Err(RenderError::OutputTooLarge { limit: MAX_OUTPUT_PIXELS, .. })
        ));
        assert!(matches!(
            check_output_size(u32::MAX, u32::MAX),
            Err(RenderError::OutputTooLarge { .. })
        ));
        assert!(matches!(check_output_size(0, 5), Err(RenderError::EmptyOutput { .. })));
    }

    #[test]
    fn test_region_is_clamped_before_sizing() {
        let src = source(200, 200, 100.0, 100.0);
        let region = CropRegion::pixels(80.0, 80.0, 50.0, 50.0);
        let plan = RenderPlan::new(&src, &region, &TransformState::default(), 1.0).unwrap();
        assert_eq!((plan.width, plan.height), (40, 40));
    }
}
