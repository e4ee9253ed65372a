use crate::camera::DepthModel;
use crate::color::ColorTable;
use crate::orientation::{DirectionPolicy, DEFAULT_RAY_LENGTH};
use crate::segment::SegmentConfig;
use crate::split::SplitConfig;

/// Shape gates applied to candidate regions and their split cells.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShapeFilter {
    /// Regions with `area / hull_area` below this are rejected before splitting
    /// is honored.
    pub min_solidity: f64,
    /// Accepted `width / height` range of each (split) cell.
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self {
            min_solidity: 0.6,
            min_aspect: 1.2,
            max_aspect: 6.0,
        }
    }
}

impl ShapeFilter {
    pub fn accepts_aspect(&self, aspect: f64) -> bool {
        aspect >= self.min_aspect && aspect <= self.max_aspect
    }
}

/// Top-level detection configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// HSV ranges per color, visited in order.
    pub colors: ColorTable,
    /// Mask cleanup and minimum region area.
    pub segment: SegmentConfig,
    /// Merged-blob splitting.
    pub split: SplitConfig,
    /// Solidity and aspect gates.
    pub shape: ShapeFilter,
    /// Known block length and optional focal-length override.
    pub depth: DepthModel,
    /// Sign convention for the long-axis direction.
    pub direction: DirectionPolicy,
    /// Length of the anchor ray in pixels.
    pub anchor_ray_px: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            colors: ColorTable::default(),
            segment: SegmentConfig::default(),
            split: SplitConfig::default(),
            shape: ShapeFilter::default(),
            depth: DepthModel::default(),
            direction: DirectionPolicy::default(),
            anchor_ray_px: DEFAULT_RAY_LENGTH,
        }
    }
}
