//! Crop regions in percent or displayed-pixel units.
//!
//! A region is always expressed against the **displayed** size of the source
//! image. Percent regions are independent of layout, pixel regions are what
//! the renderer consumes.

use serde::{Deserialize, Serialize};

use crate::source::DisplaySize;

/// Unit tag for [`CropRegion`] coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropUnit {
    /// Percent (0-100) of the displayed width/height.
    #[default]
    Percent,
    /// Displayed (CSS) pixels.
    #[serde(rename = "px")]
    Pixels,
}

/// A rectangular selection over the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    #[serde(default)]
    pub unit: CropUnit,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    pub fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: CropUnit::Percent,
            x,
            y,
            width,
            height,
        }
    }

    pub fn pixels(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: CropUnit::Pixels,
            x,
            y,
            width,
            height,
        }
    }

    /// Express this region in displayed pixels.
    pub fn to_pixels(&self, bounds: DisplaySize) -> Self {
        match self.unit {
            CropUnit::Pixels => *self,
            CropUnit::Percent => Self::pixels(
                self.x / 100.0 * bounds.width,
                self.y / 100.0 * bounds.height,
                self.width / 100.0 * bounds.width,
                self.height / 100.0 * bounds.height,
            ),
        }
    }

    /// Express this region in percent of the displayed size.
    pub fn to_percent(&self, bounds: DisplaySize) -> Self {
        match self.unit {
            CropUnit::Percent => *self,
            CropUnit::Pixels => {
                if bounds.width <= 0.0 || bounds.height <= 0.0 {
                    return Self::percent(0.0, 0.0, 0.0, 0.0);
                }
                Self::percent(
                    self.x / bounds.width * 100.0,
                    self.y / bounds.height * 100.0,
                    self.width / bounds.width * 100.0,
                    self.height / bounds.height * 100.0,
                )
            }
        }
    }

    /// Intersect with the displayed bounds, keeping the current unit.
    ///
    /// Non-finite coordinates collapse to zero, so the result never references
    /// anything outside the image.
    pub fn clamp_to(&self, bounds: DisplaySize) -> Self {
        let (max_w, max_h) = match self.unit {
            CropUnit::Percent => (100.0, 100.0),
            CropUnit::Pixels => (bounds.width.max(0.0), bounds.height.max(0.0)),
        };
        let (x0, x1) = clip_span(self.x, self.width, max_w);
        let (y0, y1) = clip_span(self.y, self.height, max_h);
        Self {
            unit: self.unit,
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// True when both sides are strictly positive.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Width-over-height ratio measured in displayed pixels.
    pub fn aspect(&self, bounds: DisplaySize) -> Option<f64> {
        let px = self.to_pixels(bounds);
        (px.height > 0.0).then(|| px.width / px.height)
    }
}

fn clip_span(start: f64, len: f64, max: f64) -> (f64, f64) {
    let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };
    let start = sanitize(start);
    let end = start + sanitize(len).max(0.0);
    let lo = start.clamp(0.0, max);
    let hi = end.clamp(lo, max);
    (lo, hi)
}

/// Centered initial region covering `width_percent` of the displayed width.
///
/// The height follows `aspect` (width / height in pixels). When the derived
/// height would not fit, the height is pinned to the full image and the width
/// shrinks to keep the aspect. A non-positive or non-finite aspect yields a
/// region with equal width and height percentages.
pub fn initial_crop(displayed: DisplaySize, width_percent: f64, aspect: f64) -> CropRegion {
    let width_percent = width_percent.clamp(0.0, 100.0);
    if !(aspect.is_finite() && aspect > 0.0) || !displayed.is_valid() {
        let offset = (100.0 - width_percent) / 2.0;
        return CropRegion::percent(offset, offset, width_percent, width_percent);
    }

    let mut width = width_percent / 100.0 * displayed.width;
    let mut height = width / aspect;
    if height > displayed.height {
        height = displayed.height;
        width = height * aspect;
    }
    let x = (displayed.width - width) / 2.0;
    let y = (displayed.height - height) / 2.0;
    CropRegion::pixels(x, y, width, height).to_percent(displayed)
}

/// Re-fit a region to a locked aspect ratio, anchored at its top-left corner.
///
/// The width is kept where possible; the height is derived from it and both
/// shrink together when the region would overflow the bottom edge.
pub fn fit_to_aspect(region: &CropRegion, aspect: f64, bounds: DisplaySize) -> CropRegion {
    if !(aspect.is_finite() && aspect > 0.0) {
        return region.clamp_to(bounds);
    }
    let px = region.to_pixels(bounds).clamp_to(bounds);
    let mut width = px.width;
    let mut height = width / aspect;
    let room = bounds.height - px.y;
    if height > room {
        height = room.max(0.0);
        width = height * aspect;
    }
    let fitted = CropRegion::pixels(px.x, px.y, width, height);
    match region.unit {
        CropUnit::Pixels => fitted,
        CropUnit::Percent => fitted.to_percent(bounds),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn bounds_strategy() -> impl Strategy<Value = DisplaySize> {
        (1.0f64..2000.0, 1.0f64..2000.0).prop_map(|(w, h)| DisplaySize::new(w, h))
    }

    proptest! {
        /// Property: clamped pixel regions always lie inside the bounds.
        #[test]
        fn prop_clamped_region_inside_bounds(
            bounds in bounds_strategy(),
            (x, y) in (-500.0f64..2500.0, -500.0f64..2500.0),
            (w, h) in (-100.0f64..3000.0, -100.0f64..3000.0),
        ) {
            let r = CropRegion::pixels(x, y, w, h).clamp_to(bounds);
            prop_assert!(r.x >= 0.0 && r.y >= 0.0);
            prop_assert!(r.width >= 0.0 && r.height >= 0.0);
            prop_assert!(r.x + r.width <= bounds.width + 1e-9);
            prop_assert!(r.y + r.height <= bounds.height + 1e-9);
        }

        /// Property: the initial region is centered, inside bounds and aspect-correct.
        #[test]
        fn prop_initial_crop_centered(
            bounds in bounds_strategy(),
            aspect in 0.2f64..5.0,
            pct in 10.0f64..100.0,
        ) {
            let r = initial_crop(bounds, pct, aspect).to_pixels(bounds);
            prop_assert!(r.x >= -1e-6 && r.y >= -1e-6);
            prop_assert!(r.x + r.width <= bounds.width + 1e-6);
            prop_assert!(r.y + r.height <= bounds.height + 1e-6);
            prop_assert!((r.x - (bounds.width - r.x - r.width)).abs() < 1e-6);
            prop_assert!((r.y - (bounds.height - r.y - r.height)).abs() < 1e-6);
            prop_assert!((r.width / r.height - aspect).abs() < 1e-6 * aspect.max(1.0));
        }

        /// Property: percent -> pixels -> percent is stable.
        #[test]
        fn prop_unit_conversion_stable(
            bounds in bounds_strategy(),
            (x, y, w, h) in (0.0f64..100.0, 0.0f64..100.0, 0.0f64..100.0, 0.0f64..100.0),
        ) {
            let r = CropRegion::percent(x, y, w, h);
            let back = r.to_pixels(bounds).to_percent(bounds);
            prop_assert!((back.x - x).abs() < 1e-6);
            prop_assert!((back.width - w).abs() < 1e-6);
            prop_assert!((back.height - h).abs() < 1e-6);
        }
    }
}
