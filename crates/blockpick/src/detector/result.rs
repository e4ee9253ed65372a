use std::collections::BTreeMap;

use crate::geometry::RotatedRect;

/// One detected block. Created fresh per detection pass.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlockObservation {
    pub color: String,
    /// Center in image pixels.
    pub center: [f64; 2],
    /// Side along the long axis, in pixels.
    pub long_side: f64,
    /// Side across the long axis, in pixels.
    pub short_side: f64,
    /// Direction of the long side in degrees, clockwise from +x.
    pub angle_deg: f64,
    /// Region area divided over the cells it was split into (px²).
    pub area: f64,
    /// Estimated camera distance; zero without a focal length.
    pub distance: f64,
    pub aspect_ratio: f64,
    pub solidity: f64,
    /// Camera-frame point of the center.
    pub camera_xyz: [f64; 3],
    /// Robot-frame point of the center, absent when uncalibrated.
    pub robot_xyz: Option<[f64; 3]>,
    /// Anchor on the far edge, in image pixels.
    pub anchor_px: Option<[f64; 2]>,
    pub anchor_camera_xyz: Option<[f64; 3]>,
    pub anchor_robot_xyz: Option<[f64; 3]>,
}

impl BlockObservation {
    /// The observation's rectangle in image pixels.
    pub fn rect(&self) -> RotatedRect {
        RotatedRect::new(self.center, self.long_side, self.short_side, self.angle_deg)
    }

    /// Grasp target: the anchor's robot point, else its camera point.
    pub fn grasp_target(&self) -> Option<[f64; 3]> {
        self.anchor_robot_xyz.or(self.anchor_camera_xyz)
    }
}

/// Ordered color → grasp target list.
pub type ColorTargets = BTreeMap<String, Vec<[f64; 3]>>;

/// Full detection result for a single image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionResult {
    pub blocks: Vec<BlockObservation>,
    /// Image dimensions [width, height].
    pub image_size: [u32; 2],
    /// Whether a calibration matrix was available for robot-frame points.
    pub calibrated: bool,
}

impl DetectionResult {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            blocks: Vec::new(),
            image_size: [width, height],
            calibrated: false,
        }
    }

    /// Blocks of one color, in detection order.
    pub fn of_color<'a>(&'a self, color: &'a str) -> impl Iterator<Item = &'a BlockObservation> + 'a {
        self.blocks.iter().filter(move |b| b.color == color)
    }

    /// Grasp targets grouped by color. Blocks without an anchor are skipped.
    pub fn targets(&self) -> ColorTargets {
        let mut out = ColorTargets::new();
        for block in &self.blocks {
            if let Some(t) = block.grasp_target() {
                out.entry(block.color.clone()).or_default().push(t);
            }
        }
        out
    }
}
