//! Pixel sampling with nearest, bilinear and Lanczos3 interpolation.
//!
//! Coordinates are continuous source positions where pixel `(i, j)` covers
//! `[i, i+1) x [j, j+1)` and its centre sits at `(i + 0.5, j + 0.5)`.
//! Interpolation runs on premultiplied alpha so transparent neighbours do not
//! bleed their colour into the result. Neighbours past the edge are clamped.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Interpolation filter used when rendering the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Nearest neighbour (fastest, lowest quality).
    Nearest,
    /// Bilinear - good for interactive previews.
    #[default]
    Bilinear,
    /// Lanczos3 - highest quality, used for export.
    Lanczos3,
}

impl Filter {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Filter::Nearest => image::imageops::FilterType::Nearest,
            Filter::Bilinear => image::imageops::FilterType::Triangle,
            Filter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Sample `image` at continuous position `(x, y)`.
///
/// Positions outside the image return fully transparent black, matching an
/// unpainted canvas.
pub(crate) fn sample(image: &RgbaImage, x: f64, y: f64, filter: Filter) -> [u8; 4] {
    let (w, h) = (image.width() as f64, image.height() as f64);
    if !(x >= 0.0 && y >= 0.0 && x <= w && y <= h) {
        return TRANSPARENT;
    }

    // Shift to pixel-index space: integer values land on pixel centres.
    let u = x - 0.5;
    let v = y - 0.5;
    match filter {
        Filter::Nearest => sample_nearest(image, x, y),
        Filter::Bilinear => sample_bilinear(image, u, v),
        Filter::Lanczos3 => sample_lanczos3(image, u, v),
    }
}

#[inline]
fn clamp_index(i: i64, len: u32) -> u32 {
    i.clamp(0, len as i64 - 1) as u32
}

/// Premultiplied pixel as `[r*a, g*a, b*a, a]` with `a` in 0..=1.
#[inline]
fn premultiplied(image: &RgbaImage, px: u32, py: u32) -> [f64; 4] {
    let p = image.get_pixel(px, py).0;
    let a = p[3] as f64 / 255.0;
    [p[0] as f64 * a, p[1] as f64 * a, p[2] as f64 * a, a]
}

fn unpremultiply(sum: [f64; 4]) -> [u8; 4] {
    let a = sum[3].clamp(0.0, 1.0);
    if a <= 0.0 {
        return TRANSPARENT;
    }
    [
        (sum[0] / a).clamp(0.0, 255.0).round() as u8,
        (sum[1] / a).clamp(0.0, 255.0).round() as u8,
        (sum[2] / a).clamp(0.0, 255.0).round() as u8,
        (a * 255.0).round() as u8,
    ]
}

fn sample_nearest(image: &RgbaImage, x: f64, y: f64) -> [u8; 4] {
    let px = clamp_index(x.floor() as i64, image.width());
    let py = clamp_index(y.floor() as i64, image.height());
    image.get_pixel(px, py).0
}

/// Bilinear interpolation over the 4 nearest pixel centres.
fn sample_bilinear(image: &RgbaImage, u: f64, v: f64) -> [u8; 4] {
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;

    let (w, h) = image.dimensions();
    let xa = clamp_index(x0 as i64, w);
    let xb = clamp_index(x0 as i64 + 1, w);
    let ya = clamp_index(y0 as i64, h);
    let yb = clamp_index(y0 as i64 + 1, h);

    let p00 = premultiplied(image, xa, ya);
    let p10 = premultiplied(image, xb, ya);
    let p01 = premultiplied(image, xa, yb);
    let p11 = premultiplied(image, xb, yb);

    let mut sum = [0.0f64; 4];
    for i in 0..4 {
        sum[i] = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
    }
    unpremultiply(sum)
}

/// Lanczos3 interpolation over a 6x6 neighbourhood.
fn sample_lanczos3(image: &RgbaImage, u: f64, v: f64) -> [u8; 4] {
    let x0 = u.floor() as i64;
    let y0 = v.floor() as i64;
    let (w, h) = image.dimensions();

    let mut wx = [0.0f64; 6];
    let mut wy = [0.0f64; 6];
    for k in 0..6 {
        wx[k] = lanczos_weight(u - (x0 - 2 + k as i64) as f64, 3.0);
        wy[k] = lanczos_weight(v - (y0 - 2 + k as i64) as f64, 3.0);
    }

    let mut sum = [0.0f64; 4];
    let mut weight_sum = 0.0;
    for (ky, wy_k) in wy.iter().enumerate() {
        let py = clamp_index(y0 - 2 + ky as i64, h);
        for (kx, wx_k) in wx.iter().enumerate() {
            let px = clamp_index(x0 - 2 + kx as i64, w);
            let weight = wx_k * wy_k;
            let p = premultiplied(image, px, py);
            for i in 0..4 {
                sum[i] += p[i] * weight;
            }
            weight_sum += weight;
        }
    }

    if weight_sum.abs() < f64::EPSILON {
        return TRANSPARENT;
    }
    for s in &mut sum {
        *s /= weight_sum;
    }
    unpremultiply(sum)
}

/// Lanczos kernel weight function.
///
/// ```text
/// L(x) = sinc(x) * sinc(x/a)  for |x| < a
/// L(x) = 0                     for |x| >= a
/// ```
fn lanczos_weight(x: f64, a: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let pi_x = std::f64::consts::PI * x;
    let pi_x_a = pi_x / a;
    (a * pi_x.sin() * pi_x_a.sin()) / (pi_x * pi_x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 10) as u8, (y * 10) as u8, 100, 255])
        })
    }

    #[test]
    fn test_pixel_centres_are_exact_for_every_filter() {
        let img = gradient(12, 9);
        for filter in [Filter::Nearest, Filter::Bilinear, Filter::Lanczos3] {
            for (x, y) in [(0u32, 0u32), (5, 4), (11, 8), (3, 7)] {
                let got = sample(&img, x as f64 + 0.5, y as f64 + 0.5, filter);
                assert_eq!(got, img.get_pixel(x, y).0, "{:?} at ({}, {})", filter, x, y);
            }
        }
    }

    #[test]
    fn test_outside_is_transparent() {
        let img = gradient(4, 4);
        assert_eq!(sample(&img, -0.1, 1.0, Filter::Bilinear), TRANSPARENT);
        assert_eq!(sample(&img, 1.0, 4.1, Filter::Lanczos3), TRANSPARENT);
        assert_eq!(sample(&img, f64::NAN, 1.0, Filter::Nearest), TRANSPARENT);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut img = RgbaImage::from_pixel(2, 1, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([200, 100, 50, 255]));
        // Halfway between the two centres.
        let p = sample(&img, 1.0, 0.5, Filter::Bilinear);
        assert_eq!(p, [100, 50, 25, 255]);
    }

    #[test]
    fn test_premultiplied_blend_keeps_colour() {
        let mut img = RgbaImage::from_pixel(2, 1, image::Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, image::Rgba([200, 100, 50, 255]));
        let p = sample(&img, 1.0, 0.5, Filter::Bilinear);
        // Colour comes only from the opaque neighbour, alpha is halved.
        assert_eq!(&p[..3], &[200, 100, 50]);
        assert!((p[3] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_lanczos_uniform_image_stays_uniform() {
        let img = RgbaImage::from_pixel(10, 10, image::Rgba([42, 84, 126, 255]));
        for (x, y) in [(0.3, 0.2), (4.7, 5.1), (9.9, 9.9)] {
            assert_eq!(sample(&img, x, y, Filter::Lanczos3), [42, 84, 126, 255]);
        }
    }

    #[test]
    fn test_lanczos_weight_at_zero() {
        assert!((lanczos_weight(0.0, 3.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lanczos_weight_at_boundary() {
        assert!(lanczos_weight(3.0, 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lanczos_weight_symmetry() {
        assert!((lanczos_weight(1.5, 3.0) - lanczos_weight(-1.5, 3.0)).abs() < 1e-10);
    }

    #[test]
    fn test_filter_type_conversion() {
        assert!(matches!(
            Filter::Bilinear.to_image_filter(),
            image::imageops::FilterType::Triangle
        ));
        assert!(matches!(
            Filter::Lanczos3.to_image_filter(),
            image::imageops::FilterType::Lanczos3
        ));
    }
}
