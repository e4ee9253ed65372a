//! Camera frame → robot frame conversion.
//!
//! The calibrated homography only resolves the table plane. Robot-frame
//! height comes from a fixed height model instead.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationMatrix;
use crate::camera::{CameraIntrinsics, MIN_PROJECTION_DEPTH};

/// Fixed heights used to place a block above the table in the robot frame.
///
/// The defaults are the constants the rig was tuned with; their units are
/// not homogeneous (camera height in the depth unit, table and block in mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightModel {
    /// Camera height above the robot origin.
    pub camera_height: f64,
    /// Table surface height in the robot frame.
    pub table_height: f64,
    /// Full block height; half of it is added to reach the block center.
    pub block_height: f64,
}

impl Default for HeightModel {
    fn default() -> Self {
        Self {
            camera_height: 78.5,
            table_height: -120.0,
            block_height: 15.0,
        }
    }
}

impl HeightModel {
    pub fn robot_z(&self, camera_depth: f64) -> f64 {
        self.camera_height - camera_depth + self.table_height + self.block_height / 2.0
    }
}

/// Maps camera-frame points into the robot frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransformer {
    intrinsics: CameraIntrinsics,
    homography: Option<CalibrationMatrix>,
    heights: HeightModel,
}

impl FrameTransformer {
    pub fn new(
        intrinsics: CameraIntrinsics,
        homography: Option<CalibrationMatrix>,
        heights: HeightModel,
    ) -> Self {
        Self {
            intrinsics,
            homography,
            heights,
        }
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics
    }

    pub fn heights(&self) -> HeightModel {
        self.heights
    }

    pub fn is_calibrated(&self) -> bool {
        self.homography.is_some()
    }

    /// Convert a camera-frame point to the robot frame.
    ///
    /// Returns `None` when uncalibrated, when `|z|` is too small to reproject,
    /// or when the homography's projective normalizer degenerates.
    pub fn to_robot(&self, camera_xyz: [f64; 3]) -> Option<[f64; 3]> {
        let h = self.homography.as_ref()?;
        if camera_xyz[2].abs() < MIN_PROJECTION_DEPTH {
            return None;
        }
        let pixel = self.intrinsics.project(camera_xyz)?;
        let [x, y] = h.apply(pixel)?;
        Some([x, y, self.heights.robot_z(camera_xyz[2])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 610.0,
            fy: 612.0,
            cx: 320.0,
            cy: 240.0,
        }
    }

    fn scale_translate() -> CalibrationMatrix {
        CalibrationMatrix::from_array([[0.5, 0.0, 100.0], [0.0, -0.5, 50.0], [0.0, 0.0, 1.0]])
    }

    #[test]
    fn uncalibrated_transform_is_absent() {
        let t = FrameTransformer::new(intrinsics(), None, HeightModel::default());
        assert!(!t.is_calibrated());
        assert!(t.to_robot([1.0, 2.0, 40.0]).is_none());
    }

    #[test]
    fn zero_depth_is_absent() {
        let t = FrameTransformer::new(intrinsics(), Some(scale_translate()), HeightModel::default());
        assert!(t.to_robot([1.0, 2.0, 0.0]).is_none());
    }

    #[test]
    fn degenerate_normalizer_is_absent() {
        // Third row makes w = u - 320, zero at the principal point.
        let h = CalibrationMatrix::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, -320.0]]);
        let t = FrameTransformer::new(intrinsics(), Some(h), HeightModel::default());
        assert!(t.to_robot([0.0, 0.0, 30.0]).is_none());
    }

    #[test]
    fn applies_homography_to_reprojected_pixel() {
        let k = intrinsics();
        let t = FrameTransformer::new(k, Some(scale_translate()), HeightModel::default());
        let cam = k.back_project([420.0, 140.0], 50.0).unwrap();
        let r = t.to_robot(cam).unwrap();
        assert_relative_eq!(r[0], 0.5 * 420.0 + 100.0, epsilon = 1e-9);
        assert_relative_eq!(r[1], -0.5 * 140.0 + 50.0, epsilon = 1e-9);
        assert_relative_eq!(r[2], 78.5 - 50.0 - 120.0 + 7.5, epsilon = 1e-12);
    }

    #[test]
    fn reprojection_round_trip_for_random_points() {
        let k = intrinsics();
        let mut rng = rand::rngs::StdRng::seed_from_u64(21);
        for _ in 0..200 {
            let u = rng.gen_range(0.0..640.0);
            let v = rng.gen_range(0.0..480.0);
            let z = rng.gen_range(0.1..200.0);
            let p = k.back_project([u, v], z).unwrap();
            let uv = k.project(p).unwrap();
            assert_relative_eq!(uv[0], u, epsilon = 1e-8);
            assert_relative_eq!(uv[1], v, epsilon = 1e-8);
        }
    }
}
