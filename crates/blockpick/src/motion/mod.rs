//! Arm hardware seam, motion-completion synchronization and action plans.
//!
//! Everything that talks to the arm goes through [`ArmAdapter`]. The
//! [`MotionSequencer`] issues plan steps one at a time and, for steps that
//! ask for it, blocks in the [`MotionSynchronizer`] until feedback settles.

mod plans;
pub mod roarm;
mod sequence;
pub mod sim;
mod sync;

pub use plans::{ActionPlans, DropPlan, GraspTarget, PickPlan, PlacePlan, TargetError, GRIPPER_JOINT};
pub use sequence::{MotionPlan, MotionSequencer, MotionStep, SequenceError, SequenceReport};
pub use sync::{MotionSynchronizer, SyncConfig, SyncOutcome};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// The request never produced a usable reply.
    Transport(String),
    /// A reply arrived but could not be understood.
    InvalidResponse(String),
}

impl std::fmt::Display for HardwareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport failure: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "invalid arm response: {}", msg),
        }
    }
}

impl std::error::Error for HardwareError {}

// ── Targets and feedback ─────────────────────────────────────────────────

/// Cartesian move request for the end effector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Gripper angle in radians carried through the move.
    pub t: f64,
    pub speed: f64,
    /// Block until the arm reports it has stopped.
    pub wait: bool,
}

/// Live axis readings keyed by name (`b, s, e, h` joints; `x, y, z, t` pose).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feedback {
    values: BTreeMap<String, f64>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, axis: &str) -> Option<f64> {
        self.values.get(axis).copied()
    }

    pub fn insert(&mut self, axis: impl Into<String>, value: f64) {
        self.values.insert(axis.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Keep only the named axes.
    pub fn restricted_to(&self, axes: &[String]) -> Self {
        self.values
            .iter()
            .filter(|(k, _)| axes.iter().any(|a| a == *k))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Largest absolute change over axes present in both readings.
    pub fn max_abs_delta(&self, previous: &Feedback) -> f64 {
        self.values
            .iter()
            .filter_map(|(k, v)| previous.get(k).map(|p| (v - p).abs()))
            .fold(0.0, f64::max)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Feedback {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ── Hardware seam ────────────────────────────────────────────────────────

/// Request/response primitives of the arm firmware.
pub trait ArmAdapter {
    /// Current joint angles and end-effector pose.
    fn feedback(&mut self) -> Result<Feedback, HardwareError>;

    /// Inverse-kinematics move of the end effector.
    fn move_cartesian(&mut self, x: f64, y: f64, z: f64, t: f64, speed: f64)
        -> Result<(), HardwareError>;

    /// Single-joint move (1 base, 2 shoulder, 3 elbow, 4 gripper).
    fn set_joint_angle(&mut self, joint: u8, angle: f64, speed: f64) -> Result<(), HardwareError>;

    fn set_torque(&mut self, enabled: bool) -> Result<(), HardwareError>;

    /// Out-of-band stop. Disables torque unless the adapter knows better.
    fn emergency_stop(&mut self) -> Result<(), HardwareError> {
        self.set_torque(false)
    }
}

impl<A: ArmAdapter + ?Sized> ArmAdapter for &mut A {
    fn feedback(&mut self) -> Result<Feedback, HardwareError> {
        (**self).feedback()
    }

    fn move_cartesian(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        t: f64,
        speed: f64,
    ) -> Result<(), HardwareError> {
        (**self).move_cartesian(x, y, z, t, speed)
    }

    fn set_joint_angle(&mut self, joint: u8, angle: f64, speed: f64) -> Result<(), HardwareError> {
        (**self).set_joint_angle(joint, angle, speed)
    }

    fn set_torque(&mut self, enabled: bool) -> Result<(), HardwareError> {
        (**self).set_torque(enabled)
    }

    fn emergency_stop(&mut self) -> Result<(), HardwareError> {
        (**self).emergency_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn delta_ignores_axes_missing_from_either_reading() {
        let prev: Feedback = [("x", 10.0), ("y", 5.0)].into_iter().collect();
        let cur: Feedback = [("x", 10.5), ("z", 99.0)].into_iter().collect();
        assert_relative_eq!(cur.max_abs_delta(&prev), 0.5);
    }

    #[test]
    fn restriction_keeps_named_axes() {
        let f: Feedback = [("x", 1.0), ("T", 105.0), ("b", 0.2)].into_iter().collect();
        let axes = vec!["b".to_string(), "x".to_string()];
        let r = f.restricted_to(&axes);
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("T"), None);
        assert_eq!(r.get("b"), Some(0.2));
    }

    #[test]
    fn hardware_error_messages() {
        let e = HardwareError::Transport("connection refused".into());
        assert_eq!(e.to_string(), "transport failure: connection refused");
    }
}
