//! Block detection pipeline.
//!
//! Stages per color: segmentation → merged-blob split → shape gates →
//! monocular distance → back-projection → robot frame → anchor point.

mod config;
mod result;

pub use config::{DetectConfig, ShapeFilter};
pub use result::{BlockObservation, ColorTargets, DetectionResult};

use image::RgbImage;

use crate::camera::CameraIntrinsics;
use crate::geometry::RotatedRect;
use crate::orientation::resolve_anchor;
use crate::segment::{extract_regions, CandidateRegion};
use crate::split::split_rect;
use crate::transform::FrameTransformer;

/// Primary detection interface.
///
/// Create once, detect on many images. Without intrinsics, camera-frame
/// points use depth only (`[0, 0, distance]`) and no robot-frame points
/// are produced.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    config: DetectConfig,
    intrinsics: Option<CameraIntrinsics>,
    transformer: Option<FrameTransformer>,
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::new(DetectConfig::default())
    }
}

impl BlockDetector {
    pub fn new(config: DetectConfig) -> Self {
        Self {
            config,
            intrinsics: None,
            transformer: None,
        }
    }

    /// Use `intrinsics` for back-projection (no robot frame).
    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    /// Use the transformer's intrinsics and calibration.
    pub fn with_transformer(mut self, transformer: FrameTransformer) -> Self {
        self.intrinsics = Some(transformer.intrinsics());
        self.transformer = Some(transformer);
        self
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DetectConfig {
        &mut self.config
    }

    pub fn is_calibrated(&self) -> bool {
        self.transformer.as_ref().is_some_and(|t| t.is_calibrated())
    }

    /// Detect all blocks in an RGB image.
    pub fn detect(&self, image: &RgbImage) -> DetectionResult {
        let regions = extract_regions(image, &self.config.colors, &self.config.segment);
        let mut result = DetectionResult::empty(image.width(), image.height());
        result.calibrated = self.is_calibrated();

        for region in &regions {
            self.observe_region(region, &mut result.blocks);
        }
        tracing::info!(
            regions = regions.len(),
            blocks = result.blocks.len(),
            calibrated = result.calibrated,
            "detection pass complete"
        );
        result
    }

    /// Split one region and turn every accepted cell into an observation.
    fn observe_region(&self, region: &CandidateRegion, out: &mut Vec<BlockObservation>) {
        let shape = &self.config.shape;
        if region.solidity < shape.min_solidity {
            tracing::debug!(
                color = %region.color,
                solidity = region.solidity,
                "region rejected: low solidity"
            );
            return;
        }

        let split = split_rect(&region.rect, &self.config.split);
        let area_each = region.area / split.rects.len().max(1) as f64;
        for cell in &split.rects {
            if cell.width <= 1e-6 || cell.height <= 1e-6 {
                continue;
            }
            let aspect = cell.width / cell.height;
            if !shape.accepts_aspect(aspect) {
                tracing::debug!(color = %region.color, aspect, "cell rejected: aspect");
                continue;
            }
            out.push(self.observe_cell(region, cell, aspect, area_each));
        }
    }

    fn observe_cell(
        &self,
        region: &CandidateRegion,
        cell: &RotatedRect,
        aspect: f64,
        area: f64,
    ) -> BlockObservation {
        let focal = self.intrinsics.map(|k| k.fx);
        let distance = self.config.depth.distance(focal, cell.width);

        let camera_xyz = self.back_project(cell.center, distance);
        let robot_xyz = self.to_robot(camera_xyz);

        let (_, anchor_px) = resolve_anchor(cell, &self.config.direction, self.config.anchor_ray_px);
        let anchor_camera_xyz = anchor_px.map(|p| self.back_project(p, distance));
        let anchor_robot_xyz = anchor_camera_xyz.and_then(|p| self.to_robot(p));

        BlockObservation {
            color: region.color.clone(),
            center: cell.center,
            long_side: cell.width,
            short_side: cell.height,
            angle_deg: cell.angle_deg,
            area,
            distance,
            aspect_ratio: aspect,
            solidity: region.solidity,
            camera_xyz,
            robot_xyz,
            anchor_px,
            anchor_camera_xyz,
            anchor_robot_xyz,
        }
    }

    fn back_project(&self, pixel: [f64; 2], distance: f64) -> [f64; 3] {
        self.intrinsics
            .and_then(|k| k.back_project(pixel, distance))
            .unwrap_or([0.0, 0.0, distance])
    }

    fn to_robot(&self, camera_xyz: [f64; 3]) -> Option<[f64; 3]> {
        self.transformer.as_ref()?.to_robot(camera_xyz)
    }
}
