//! Session configuration: one JSON document wiring detection, calibration
//! and arm control together.
//!
//! Every section is optional in the file; missing fields take the tuned
//! defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationMatrix, Calibrator};
use crate::camera::CameraIntrinsics;
use crate::detector::{BlockDetector, DetectConfig};
use crate::fsm::{ActionGate, ArmState};
use crate::motion::{ActionPlans, ArmAdapter, MotionSynchronizer, SyncConfig};
use crate::transform::{FrameTransformer, HeightModel};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Parse { path, source } => {
                write!(f, "{}: invalid JSON: {}", path.display(), source)
            }
            Self::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub detect: DetectConfig,
    /// Color-stream intrinsics. Without them no 3-D points are produced.
    pub intrinsics: Option<CameraIntrinsics>,
    pub heights: HeightModel,
    /// Where the calibration matrix is stored. A missing file is allowed.
    pub calibration_path: Option<PathBuf>,
    pub calibrator: Calibrator,
    pub sync: SyncConfig,
    pub plans: ActionPlans,
    /// Gripper state assumed at startup.
    pub initial_state: ArmState,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detect: DetectConfig::default(),
            intrinsics: None,
            heights: HeightModel::default(),
            calibration_path: Some(PathBuf::from("calibration/calibration_matrix.json")),
            calibrator: Calibrator::default(),
            sync: SyncConfig::default(),
            plans: ActionPlans::default(),
            initial_state: ArmState::Empty,
        }
    }
}

impl SessionConfig {
    /// Load a session file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::parse(path, e))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "session config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(k) = &self.intrinsics {
            if !k.is_valid() {
                return Err(ConfigError::Invalid(
                    "intrinsics need finite, positive focal lengths".to_string(),
                ));
            }
        }
        if self.detect.colors.names().next().is_none() {
            return Err(ConfigError::Invalid("color table is empty".to_string()));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let split = &self.detect.split;
        if !positive(split.block_long) || !split.block_short_sides.iter().all(|s| positive(*s)) {
            return Err(ConfigError::Invalid(
                "block dimensions must be positive".to_string(),
            ));
        }
        let shape = &self.detect.shape;
        if shape.min_aspect > shape.max_aspect {
            return Err(ConfigError::Invalid(format!(
                "aspect range [{}, {}] is empty",
                shape.min_aspect, shape.max_aspect
            )));
        }
        if self.sync.stable_polls == 0 {
            return Err(ConfigError::Invalid(
                "sync.stable_polls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the calibration matrix, if a path is configured and the file exists.
    pub fn load_calibration(&self) -> Result<Option<CalibrationMatrix>, ConfigError> {
        match &self.calibration_path {
            Some(path) => CalibrationMatrix::load(path),
            None => Ok(None),
        }
    }

    /// Detector wired with intrinsics and, when available, the calibration.
    pub fn build_detector(&self) -> Result<BlockDetector, ConfigError> {
        let detector = BlockDetector::new(self.detect.clone());
        let Some(intrinsics) = self.intrinsics else {
            tracing::warn!("no camera intrinsics configured; 3-D points disabled");
            return Ok(detector);
        };
        let calibration = self.load_calibration()?;
        let transformer = FrameTransformer::new(intrinsics, calibration, self.heights);
        Ok(detector.with_transformer(transformer))
    }

    /// Action gate over `arm` using the session's sync settings and plans.
    pub fn build_gate<A: ArmAdapter>(&self, arm: A) -> ActionGate<A> {
        ActionGate::new(
            arm,
            MotionSynchronizer::new(self.sync.clone()),
            self.plans.clone(),
        )
        .with_state(self.initial_state)
    }
}
