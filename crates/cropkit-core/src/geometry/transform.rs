//! Rotation/scale state and 2-D affine matrices.
//!
//! # Slider Mapping
//!
//! The dialog exposes two sliders with a 0-100 range:
//! - rotation: `degrees = value * 1.8`, so 0 -> 0°, 50 -> 90°, 100 -> 180°
//! - scale: `factor = 1 + value * 0.01`, so 0 -> 1x, 100 -> 2x

use serde::{Deserialize, Serialize};

/// Largest rotation reachable from the slider, in degrees.
pub const MAX_ROTATION_DEGREES: f64 = 180.0;
/// Smallest zoom factor.
pub const MIN_SCALE: f64 = 1.0;
/// Largest zoom factor.
pub const MAX_SCALE: f64 = 2.0;

const SLIDER_MAX: f64 = 100.0;
const ROTATION_PER_STEP: f64 = 1.8;
const SCALE_PER_STEP: f64 = 0.01;

/// Rotation and zoom applied about the image center before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformState {
    /// Clockwise rotation in degrees (0 to 180).
    pub rotation_degrees: f64,
    /// Uniform zoom (1.0 to 2.0).
    pub scale: f64,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            rotation_degrees: 0.0,
            scale: MIN_SCALE,
        }
    }
}

impl TransformState {
    pub fn new(rotation_degrees: f64, scale: f64) -> Self {
        Self {
            rotation_degrees: sanitize(rotation_degrees, 0.0).clamp(0.0, MAX_ROTATION_DEGREES),
            scale: sanitize(scale, MIN_SCALE).clamp(MIN_SCALE, MAX_SCALE),
        }
    }

    /// Check whether rendering reduces to a plain crop.
    pub fn is_identity(&self) -> bool {
        self.rotation_degrees.abs() < f64::EPSILON && (self.scale - 1.0).abs() < f64::EPSILON
    }

    pub fn with_rotation_slider(self, value: f64) -> Self {
        Self::new(rotation_from_slider(value), self.scale)
    }

    pub fn with_scale_slider(self, value: f64) -> Self {
        Self::new(self.rotation_degrees, scale_from_slider(value))
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Map a 0-100 slider position to degrees.
pub fn rotation_from_slider(value: f64) -> f64 {
    sanitize(value, 0.0).clamp(0.0, SLIDER_MAX) * ROTATION_PER_STEP
}

/// Map degrees back to a slider position.
pub fn slider_from_rotation(degrees: f64) -> f64 {
    sanitize(degrees, 0.0).clamp(0.0, MAX_ROTATION_DEGREES) / ROTATION_PER_STEP
}

/// Map a 0-100 slider position to a zoom factor.
pub fn scale_from_slider(value: f64) -> f64 {
    MIN_SCALE + sanitize(value, 0.0).clamp(0.0, SLIDER_MAX) * SCALE_PER_STEP
}

/// Map a zoom factor back to a slider position.
pub fn slider_from_scale(scale: f64) -> f64 {
    (sanitize(scale, MIN_SCALE).clamp(MIN_SCALE, MAX_SCALE) - MIN_SCALE) / SCALE_PER_STEP
}

/// A 2-D affine matrix in canvas layout.
///
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
///
/// The builder methods post-multiply, like `CanvasRenderingContext2D`:
/// the most recently appended operation is applied to points first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// `self * other`
    pub fn multiply(&self, other: &Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn translate(&self, tx: f64, ty: f64) -> Affine {
        self.multiply(&Affine {
            e: tx,
            f: ty,
            ..Affine::IDENTITY
        })
    }

    pub fn scale(&self, sx: f64, sy: f64) -> Affine {
        self.multiply(&Affine {
            a: sx,
            d: sy,
            ..Affine::IDENTITY
        })
    }

    /// Rotate by `radians` (clockwise on screen, y pointing down).
    pub fn rotate(&self, radians: f64) -> Affine {
        let (sin, cos) = radians.sin_cos();
        self.multiply(&Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        })
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse matrix, or `None` when singular.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_slider_endpoints() {
        assert_eq!(rotation_from_slider(0.0), 0.0);
        assert!((rotation_from_slider(50.0) - 90.0).abs() < 1e-12);
        assert!((rotation_from_slider(100.0) - 180.0).abs() < 1e-12);
        assert_eq!(scale_from_slider(0.0), 1.0);
        assert!((scale_from_slider(50.0) - 1.5).abs() < 1e-12);
        assert!((scale_from_slider(100.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_slider_out_of_range_clamps() {
        assert_eq!(rotation_from_slider(-10.0), 0.0);
        assert!((rotation_from_slider(250.0) - 180.0).abs() < 1e-12);
        assert!((scale_from_slider(f64::NAN) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slider_inverse() {
        assert!((slider_from_rotation(90.0) - 50.0).abs() < 1e-9);
        assert!((slider_from_scale(1.25) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_state_clamps() {
        let t = TransformState::new(400.0, 0.5);
        assert_eq!(t.rotation_degrees, 180.0);
        assert_eq!(t.scale, 1.0);
        assert!(TransformState::default().is_identity());
        assert!(!TransformState::new(1.0, 1.0).is_identity());
    }

    #[test]
    fn test_with_sliders() {
        let t = TransformState::default()
            .with_rotation_slider(50.0)
            .with_scale_slider(100.0);
        assert!((t.rotation_degrees - 90.0).abs() < 1e-12);
        assert!((t.scale - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_translate_then_scale_order() {
        // Canvas semantics: scale is applied to the point first.
        let m = Affine::IDENTITY.translate(10.0, 0.0).scale(2.0, 2.0);
        assert!(approx(m.apply(1.0, 1.0), (12.0, 2.0)));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let m = Affine::IDENTITY.rotate(std::f64::consts::FRAC_PI_2);
        // Clockwise on a y-down screen: +x maps to +y.
        assert!(approx(m.apply(1.0, 0.0), (0.0, 1.0)));
    }

    #[test]
    fn test_rotation_about_center() {
        let m = Affine::IDENTITY
            .translate(50.0, 25.0)
            .rotate(std::f64::consts::PI)
            .translate(-50.0, -25.0);
        assert!(approx(m.apply(50.0, 25.0), (50.0, 25.0)));
        assert!(approx(m.apply(0.0, 0.0), (100.0, 50.0)));
    }

    #[test]
    fn test_invert_round_trip() {
        let m = Affine::IDENTITY
            .scale(2.0, 2.0)
            .translate(-30.0, 12.0)
            .rotate(0.7)
            .scale(1.3, 1.3);
        let inv = m.invert().unwrap();
        let (x, y) = m.apply(3.5, -8.0);
        assert!(approx(inv.apply(x, y), (3.5, -8.0)));
        assert!(approx(
            m.multiply(&inv).apply(7.0, 9.0),
            Affine::IDENTITY.apply(7.0, 9.0)
        ));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Affine::IDENTITY.scale(0.0, 1.0).invert().is_none());
    }
}
