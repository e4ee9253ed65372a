//! Pinhole camera intrinsics, monocular distance estimate and back-projection.
//!
//! Conventions: camera at the origin, +x right, +y down, +z forward.
//! Distances use whatever length unit the known block length is given in.

use serde::{Deserialize, Serialize};

/// Below this magnitude a depth is treated as undefined for projection.
pub const MIN_PROJECTION_DEPTH: f64 = 1e-6;

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    #[serde(alias = "ppx")]
    pub cx: f64,
    /// Principal point y (pixels).
    #[serde(alias = "ppy")]
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Intrinsics with a square focal length and the principal point at the
    /// image center.
    pub fn centered(focal_px: f64, width: u32, height: u32) -> Self {
        Self {
            fx: focal_px,
            fy: focal_px,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }

    /// Returns `true` when focal lengths are finite and non-zero.
    pub fn is_valid(self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    /// Back-project pixel `(u, v)` at depth `depth` to a camera-frame point.
    ///
    /// Returns `None` for invalid intrinsics.
    pub fn back_project(self, pixel_xy: [f64; 2], depth: f64) -> Option<[f64; 3]> {
        if !self.is_valid() {
            return None;
        }
        let x = (pixel_xy[0] - self.cx) * depth / self.fx;
        let y = (pixel_xy[1] - self.cy) * depth / self.fy;
        Some([x, y, depth])
    }

    /// Forward pinhole projection of a camera-frame point to pixels.
    ///
    /// Returns `None` when `|z|` is too small for the projection to be defined.
    pub fn project(self, point: [f64; 3]) -> Option<[f64; 2]> {
        if !self.is_valid() || point[2].abs() < MIN_PROJECTION_DEPTH {
            return None;
        }
        let u = point[0] * self.fx / point[2] + self.cx;
        let v = point[1] * self.fy / point[2] + self.cy;
        if u.is_finite() && v.is_finite() {
            Some([u, v])
        } else {
            None
        }
    }
}

/// Known-size distance model: `D = L * f / pixel_long_side`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DepthModel {
    /// Real length of the block's longest side.
    pub block_length: f64,
    /// Focal length in pixels. When unset the detector falls back to the
    /// intrinsics' `fx`; when both are missing distance is reported as zero.
    pub focal_length_px: Option<f64>,
}

impl Default for DepthModel {
    fn default() -> Self {
        Self {
            block_length: 7.0,
            focal_length_px: None,
        }
    }
}

impl DepthModel {
    /// Estimate the distance to a block whose long side spans `pixel_long_side`.
    pub fn distance(&self, focal_length_px: Option<f64>, pixel_long_side: f64) -> f64 {
        estimate_distance(
            self.block_length,
            self.focal_length_px.or(focal_length_px),
            pixel_long_side,
        )
    }
}

/// Estimate distance from apparent size.
///
/// An unset focal length yields `0.0` so geometry-only runs keep working.
pub fn estimate_distance(real_length: f64, focal_length_px: Option<f64>, pixel_length: f64) -> f64 {
    let Some(f) = focal_length_px else {
        return 0.0;
    };
    if !(pixel_length > 0.0) || !f.is_finite() {
        return 0.0;
    }
    real_length * f / pixel_length
}
