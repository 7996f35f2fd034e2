//! Rendering a [`RenderPlan`] onto an RGBA surface.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::plan::RenderPlan;
use super::sample::{sample, Filter};
use crate::source::SourceImage;

/// Shape of the area kept from the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropShape {
    #[default]
    Rectangle,
    /// Ellipse inscribed in the crop rectangle; everything outside becomes transparent.
    Ellipse,
}

/// A rendered output surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pixels: RgbaImage,
    filter: Filter,
}

impl Raster {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Filter that produced this surface.
    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// RGBA bytes in row-major order.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }

    /// True when every pixel is fully opaque.
    pub fn is_opaque(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[3] == 255)
    }
}

/// Fill a new surface according to `plan`.
///
/// Uses inverse mapping: every output pixel centre is mapped back into the
/// source and sampled with `filter`. Output pixels whose source position
/// falls outside the image stay transparent.
pub fn render(source: &SourceImage, plan: &RenderPlan, filter: Filter, shape: CropShape) -> Raster {
    let src = source.pixels();
    let mut pixels = RgbaImage::new(plan.width, plan.height);

    let (rx, ry) = (plan.width as f64 / 2.0, plan.height as f64 / 2.0);

    for (x, y, out) in pixels.enumerate_pixels_mut() {
        if shape == CropShape::Ellipse && !inside_ellipse(x, y, rx, ry) {
            continue;
        }
        let (sx, sy) = plan.source_point(x, y);
        out.0 = sample(src, sx, sy, filter);
    }

    Raster { pixels, filter }
}

#[inline]
fn inside_ellipse(x: u32, y: u32, rx: f64, ry: f64) -> bool {
    let dx = (x as f64 + 0.5 - rx) / rx;
    let dy = (y as f64 + 0.5 - ry) / ry;
    dx * dx + dy * dy <= 1.0
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::geometry::{CropRegion, TransformState};
    use crate::render::output_size;
    use crate::source::{DisplaySize, SourceFormat};
    use proptest::prelude::*;

    fn source(nw: u32, nh: u32, dw: f64, dh: f64) -> SourceImage {
        let pixels = RgbaImage::from_fn(nw, nh, |x, y| image::Rgba([x as u8, y as u8, 9, 255]));
        SourceImage::from_rgba(pixels, SourceFormat::Png, DisplaySize::new(dw, dh)).unwrap()
    }

    proptest! {
        /// Property: surface size is floor(region * scale * density).
        #[test]
        fn prop_surface_dimensions(
            (nw, nh) in (8u32..=64, 8u32..=64),
            display_ratio in 0.25f64..=1.0,
            (fx, fy, fw, fh) in (0.0f64..0.5, 0.0f64..0.5, 0.2f64..=0.5, 0.2f64..=0.5),
            density in prop::sample::select(vec![1.0f64, 1.5, 2.0]),
        ) {
            let (dw, dh) = (nw as f64 * display_ratio, nh as f64 * display_ratio);
            let src = source(nw, nh, dw, dh);
            let region = CropRegion::pixels(fx * dw, fy * dh, fw * dw, fh * dh);
            let plan = RenderPlan::new(&src, &region, &TransformState::default(), density).unwrap();
            let raster = render(&src, &plan, Filter::Bilinear, CropShape::Rectangle);

            let expected_w = (region.width * src.scale_x() * density + 1e-6).floor() as u32;
            let expected_h = (region.height * src.scale_y() * density + 1e-6).floor() as u32;
            prop_assert_eq!((raster.width(), raster.height()), (expected_w, expected_h));
            prop_assert_eq!(output_size(&src, &region, density), (expected_w, expected_h));
        }

        /// Property: rendering twice gives bit-identical output.
        #[test]
        fn prop_render_idempotent(
            rotation in 0.0f64..=180.0,
            scale in 1.0f64..=2.0,
            (x, y) in (0.0f64..10.0, 0.0f64..10.0),
        ) {
            let src = source(24, 24, 24.0, 24.0);
            let region = CropRegion::pixels(x, y, 12.0, 12.0);
            let t = TransformState::new(rotation, scale);
            let plan = RenderPlan::new(&src, &region, &t, 1.0).unwrap();
            let a = render(&src, &plan, Filter::Lanczos3, CropShape::Rectangle);
            let b = render(&src, &plan, Filter::Lanczos3, CropShape::Rectangle);
            prop_assert_eq!(a, b);
        }

        /// Property: an identity transform at integer offsets is a plain crop.
        #[test]
        fn prop_identity_is_plain_crop(
            (x, y) in (0u32..16, 0u32..16),
            (w, h) in (1u32..16, 1u32..16),
        ) {
            let src = source(32, 32, 32.0, 32.0);
            let region = CropRegion::pixels(x as f64, y as f64, w as f64, h as f64);
            let plan = RenderPlan::new(&src, &region, &TransformState::default(), 1.0).unwrap();
            let raster = render(&src, &plan, Filter::Bilinear, CropShape::Rectangle);
            let expected = image::imageops::crop_imm(src.pixels(), x, y, w, h).to_image();
            prop_assert_eq!(raster.pixels(), &expected);
        }
    }
}
