//! Image → robot work-surface calibration from four fiducial markers.
//!
//! The result is a 3×3 homography persisted as a versioned JSON document
//! (`blockpick.calibration.v1`). Loading also accepts a bare row-major
//! array of nine numbers. A missing file means "uncalibrated".

use std::path::Path;

use image::GrayImage;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::homography::{
    array_to_matrix3, estimate_homography_dlt, matrix3_to_array, reprojection_error, try_project,
    HomographyError,
};
use crate::marker::{DetectedFiducial, MarkerConfig, MarkerDetector};

const CALIBRATION_SCHEMA_V1: &str = "blockpick.calibration.v1";

/// Number of marker correspondences a calibration needs.
pub const REQUIRED_MARKERS: usize = 4;

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    TooFewMarkers { needed: usize, found: usize },
    MissingMarker(u32),
    /// Three of the markers (by id) lie on one line in the image or in the
    /// robot frame.
    CollinearMarkers([u32; 3]),
    Homography(HomographyError),
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewMarkers { needed, found } => {
                write!(f, "too few markers: need {}, found {}", needed, found)
            }
            Self::MissingMarker(id) => write!(f, "marker id {} not found", id),
            Self::CollinearMarkers(ids) => write!(
                f,
                "markers {}, {} and {} are collinear; move them to a proper quadrilateral",
                ids[0], ids[1], ids[2]
            ),
            Self::Homography(e) => write!(f, "homography solve failed: {}", e),
        }
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Homography(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HomographyError> for CalibrationError {
    fn from(e: HomographyError) -> Self {
        Self::Homography(e)
    }
}

// ── Calibration matrix ───────────────────────────────────────────────────

/// Planar homography from image pixels to robot-plane coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationMatrix {
    h: Matrix3<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CalibrationFileV1 {
    schema: String,
    matrix: [[f64; 3]; 3],
}

/// Accepted on-disk layouts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CalibrationFile {
    V1(CalibrationFileV1),
    Flat([f64; 9]),
}

impl CalibrationMatrix {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(array_to_matrix3(&rows))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        matrix3_to_array(&self.h)
    }

    /// From nine row-major values.
    pub fn from_flat(v: [f64; 9]) -> Self {
        Self::from_array([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]])
    }

    pub fn to_flat(&self) -> [f64; 9] {
        let r = self.to_array();
        [
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        ]
    }

    /// Map an image pixel onto the robot plane.
    ///
    /// Returns `None` when the projective normalizer is near zero.
    pub fn apply(&self, pixel: [f64; 2]) -> Option<[f64; 2]> {
        try_project(&self.h, pixel[0], pixel[1])
    }

    /// Write the matrix as a `blockpick.calibration.v1` JSON document.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let doc = CalibrationFileV1 {
            schema: CALIBRATION_SCHEMA_V1.to_string(),
            matrix: self.to_array(),
        };
        let json = serde_json::to_string_pretty(&doc).map_err(|e| ConfigError::parse(path, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| ConfigError::io(path, e))?;
        tracing::info!(path = %path.display(), "calibration saved");
        Ok(())
    }

    /// Load a persisted matrix, either a `blockpick.calibration.v1` document
    /// or a flat row-major array of nine numbers. A missing file yields
    /// `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no calibration file; running uncalibrated");
                return Ok(None);
            }
            Err(e) => return Err(ConfigError::io(path, e)),
        };
        let file: CalibrationFile =
            serde_json::from_str(&data).map_err(|e| ConfigError::parse(path, e))?;
        Self::from_file(file).map(Some)
    }

    fn from_file(file: CalibrationFile) -> Result<Self, ConfigError> {
        let matrix = match file {
            CalibrationFile::V1(doc) => {
                if doc.schema != CALIBRATION_SCHEMA_V1 {
                    return Err(ConfigError::Invalid(format!(
                        "unsupported calibration schema '{}' (expected '{}')",
                        doc.schema, CALIBRATION_SCHEMA_V1
                    )));
                }
                Self::from_array(doc.matrix)
            }
            CalibrationFile::Flat(v) => Self::from_flat(v),
        };
        if matrix.h.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid(
                "calibration matrix has non-finite entries".to_string(),
            ));
        }
        Ok(matrix)
    }
}

// ── Calibrator ───────────────────────────────────────────────────────────

/// Known marker ids and their robot-frame positions (mm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibrator {
    pub marker_ids: [u32; REQUIRED_MARKERS],
    pub robot_points: [[f64; 2]; REQUIRED_MARKERS],
    pub marker: MarkerConfig,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self {
            marker_ids: [0, 1, 2, 3],
            robot_points: [
                [414.36, 214.40],
                [417.66, -224.17],
                [108.74, -224.55],
                [106.34, 225.74],
            ],
            marker: MarkerConfig::default(),
        }
    }
}

impl Calibrator {
    /// Solve the image → robot homography from detected markers.
    pub fn compute(&self, markers: &[DetectedFiducial]) -> Result<CalibrationMatrix, CalibrationError> {
        if markers.len() < REQUIRED_MARKERS {
            return Err(CalibrationError::TooFewMarkers {
                needed: REQUIRED_MARKERS,
                found: markers.len(),
            });
        }

        let mut image_points = [[0.0; 2]; REQUIRED_MARKERS];
        for (slot, &id) in image_points.iter_mut().zip(&self.marker_ids) {
            let marker = markers
                .iter()
                .find(|m| m.id == id)
                .ok_or(CalibrationError::MissingMarker(id))?;
            *slot = marker.center();
        }

        let h = estimate_homography_dlt(&image_points, &self.robot_points).map_err(|e| match e {
            HomographyError::Collinear { points } => {
                CalibrationError::CollinearMarkers(points.map(|i| self.marker_ids[i]))
            }
            other => CalibrationError::Homography(other),
        })?;
        let max_err = image_points
            .iter()
            .zip(&self.robot_points)
            .map(|(s, d)| reprojection_error(&h, s, d))
            .fold(0.0f64, f64::max);
        tracing::info!(max_residual_mm = max_err, "calibration solved");
        Ok(CalibrationMatrix::new(h))
    }

    /// Detect markers in `gray` and solve the calibration.
    pub fn calibrate_image(&self, gray: &GrayImage) -> Result<CalibrationMatrix, CalibrationError> {
        let markers = MarkerDetector::new(self.marker).detect(gray);
        tracing::debug!(n = markers.len(), "markers detected for calibration");
        self.compute(&markers)
    }
}
