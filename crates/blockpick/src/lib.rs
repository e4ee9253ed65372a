//! blockpick: colored block localization and gated pick/place control for
//! a desktop robot arm.
//!
//! The crate covers the path from a camera frame to a physical action:
//!
//! 1. **Segment** – HSV thresholding per color, mask cleanup, outer contours
//!    reduced to minimum-area rectangles.
//! 2. **Split** – merged same-color blobs divided into a grid of block-sized
//!    cells using the known block dimensions.
//! 3. **Orient** – long-axis direction under a fixed observer convention and
//!    an anchor point on the block edge.
//! 4. **Locate** – monocular distance from the known block length,
//!    back-projection, and an image → robot homography from four fiducials.
//! 5. **Act** – a holding/empty gate over pick, place and drop, each run as a
//!    fixed motion plan whose moves block until arm feedback settles.
//!
//! # Public API
//! - [`BlockDetector`] with [`DetectConfig`] for detection
//! - [`Calibrator`] and [`CalibrationMatrix`] for the frame calibration
//! - [`ActionGate`] over any [`ArmAdapter`] for arm control
//! - [`SessionConfig`] to wire everything from one JSON file

mod calibration;
mod camera;
mod color;
mod config;
mod detector;
mod fsm;
mod geometry;
mod homography;
mod marker;
pub mod motion;
mod orientation;
mod segment;
mod split;
mod transform;

#[cfg(test)]
pub(crate) mod test_utils;

pub use calibration::{CalibrationError, CalibrationMatrix, Calibrator, REQUIRED_MARKERS};
pub use camera::{estimate_distance, CameraIntrinsics, DepthModel};
pub use color::{color_mask, rgb_to_hsv, to_hsv, ColorRange, ColorTable, HsvBound};
pub use config::{ConfigError, SessionConfig};
pub use detector::{
    BlockDetector, BlockObservation, ColorTargets, DetectConfig, DetectionResult, ShapeFilter,
};
pub use fsm::{
    Action, ActionGate, ActionOutcome, ActionRequest, ActionStatus, ArmState, InvalidActionError,
};
pub use geometry::{min_area_rect, polygon_area, RotatedRect};
pub use homography::{estimate_homography_dlt, HomographyError};
pub use marker::{DetectedFiducial, MarkerConfig, MarkerDetector};
pub use motion::{ArmAdapter, Feedback, HardwareError, MotionTarget};
pub use orientation::{
    find_anchor, major_axis, perpendicular_ccw, resolve_anchor, segment_intersection,
    DirectionPolicy, HorizontalTieBreak, ObserverSide,
};
pub use segment::{clean_mask, extract_regions, CandidateRegion, SegmentConfig};
pub use split::{split_rect, SplitConfig, SplitResult};
pub use transform::{FrameTransformer, HeightModel};
