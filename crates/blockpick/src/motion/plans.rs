//! Fixed step lists for pick, place and drop.
//!
//! Every Cartesian move carries the gripper angle last commanded, so the
//! gripper never opens or closes as a side effect of a translation.

use serde::{Deserialize, Serialize};

use super::sequence::{MotionPlan, MotionStep};
use super::sync::seconds;
use super::MotionTarget;
use crate::detector::ColorTargets;

/// Joint id of the gripper.
pub const GRIPPER_JOINT: u8 = 4;

/// Grasp point in the robot frame. Without a height, the plan falls back to
/// its default approach and grasp heights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraspTarget {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl GraspTarget {
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

impl From<[f64; 3]> for GraspTarget {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// Pick target selection failed; nothing was sent to the arm.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetError {
    NoTargets,
    NoColor,
    UnknownColor(String),
    NoCoordinates(String),
}

impl std::fmt::Display for TargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTargets => write!(f, "no pick targets were supplied"),
            Self::NoColor => write!(f, "no color specified for pick"),
            Self::UnknownColor(c) => write!(f, "color {:?} not found in targets", c),
            Self::NoCoordinates(c) => write!(f, "no coordinates found for color {:?}", c),
        }
    }
}

impl std::error::Error for TargetError {}

fn cartesian(xyz: [f64; 3], t: f64, speed: f64) -> MotionStep {
    MotionStep::Cartesian(MotionTarget {
        x: xyz[0],
        y: xyz[1],
        z: xyz[2],
        t,
        speed,
        wait: true,
    })
}

fn gripper(angle: f64, speed: f64) -> MotionStep {
    MotionStep::Joint {
        joint: GRIPPER_JOINT,
        angle,
        speed,
        wait: true,
    }
}

// ── Pick ─────────────────────────────────────────────────────────────────

/// Open → approach → descend → grip → lift → home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickPlan {
    pub open_angle: f64,
    pub close_angle: f64,
    /// Added to the target height for the approach and lift.
    pub approach_offset: f64,
    /// Added to the target height for the grasp.
    pub grasp_offset: f64,
    pub default_approach_z: f64,
    pub default_grasp_z: f64,
    pub home: [f64; 3],
    pub gripper_speed: f64,
    pub approach_speed: f64,
    pub descend_speed: f64,
    pub lift_speed: f64,
    pub home_speed: f64,
    pub approach_settle_s: f64,
    pub grip_settle_s: f64,
    pub lift_settle_s: f64,
}

impl Default for PickPlan {
    fn default() -> Self {
        Self {
            open_angle: 1.57,
            close_angle: 3.14,
            approach_offset: 10.0,
            grasp_offset: 5.0,
            default_approach_z: 150.0,
            default_grasp_z: 50.0,
            home: [200.0, 0.0, 150.0],
            gripper_speed: 0.25,
            approach_speed: 0.4,
            descend_speed: 0.2,
            lift_speed: 0.3,
            home_speed: 0.4,
            approach_settle_s: 0.1,
            grip_settle_s: 1.0,
            lift_settle_s: 1.0,
        }
    }
}

impl PickPlan {
    /// First coordinate recorded for `color`. The color must be named.
    pub fn select_target(
        targets: &ColorTargets,
        color: Option<&str>,
    ) -> Result<(String, GraspTarget), TargetError> {
        if targets.is_empty() {
            return Err(TargetError::NoTargets);
        }
        let c = color.ok_or(TargetError::NoColor)?;
        let (name, coords) = targets
            .get_key_value(c)
            .ok_or_else(|| TargetError::UnknownColor(c.to_string()))?;
        let first = coords
            .first()
            .ok_or_else(|| TargetError::NoCoordinates(name.clone()))?;
        Ok((name.clone(), GraspTarget::from(*first)))
    }

    pub fn build(&self, target: GraspTarget) -> MotionPlan {
        let approach_z = target
            .z
            .map_or(self.default_approach_z, |z| z + self.approach_offset);
        let grasp_z = target.z.map_or(self.default_grasp_z, |z| z + self.grasp_offset);
        let above = [target.x, target.y, approach_z];
        let at = [target.x, target.y, grasp_z];

        let mut plan = MotionPlan::new("pick");
        plan.push("open gripper", gripper(self.open_angle, self.gripper_speed))
            .push(
                "approach target",
                cartesian(above, self.open_angle, self.approach_speed),
            )
            .push("settle", MotionStep::Settle(seconds(self.approach_settle_s)))
            .push("lower arm", cartesian(at, self.open_angle, self.descend_speed))
            .push("close gripper", gripper(self.close_angle, self.gripper_speed))
            .push("settle grip", MotionStep::Settle(seconds(self.grip_settle_s)))
            .push(
                "perform safety lift",
                cartesian(above, self.close_angle, self.lift_speed),
            )
            .push("settle", MotionStep::Settle(seconds(self.lift_settle_s)))
            .push(
                "return home",
                cartesian(self.home, self.close_angle, self.home_speed),
            );
        plan
    }
}

// ── Place ────────────────────────────────────────────────────────────────

/// Middle → lower → release → home with the gripper left open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacePlan {
    pub middle: [f64; 3],
    pub place_z: f64,
    /// Gripper angle carried while moving with the block.
    pub carry_angle: f64,
    pub open_angle: f64,
    pub home: [f64; 3],
    pub gripper_speed: f64,
    pub speed: f64,
    pub lower_speed: f64,
    pub middle_settle_s: f64,
    pub lower_settle_s: f64,
    pub release_settle_s: f64,
}

impl Default for PlacePlan {
    fn default() -> Self {
        Self {
            middle: [200.0, 0.0, 150.0],
            place_z: -120.0,
            carry_angle: 3.14,
            open_angle: 3.14,
            home: [200.0, 0.0, 150.0],
            gripper_speed: 0.25,
            speed: 0.4,
            lower_speed: 0.2,
            middle_settle_s: 0.1,
            lower_settle_s: 0.2,
            release_settle_s: 0.1,
        }
    }
}

impl PlacePlan {
    pub fn build(&self) -> MotionPlan {
        let [mx, my, _] = self.middle;
        let mut plan = MotionPlan::new("place");
        plan.push(
            "move to middle position",
            cartesian(self.middle, self.carry_angle, self.speed),
        )
        .push("settle", MotionStep::Settle(seconds(self.middle_settle_s)))
        .push(
            "lower arm",
            cartesian([mx, my, self.place_z], self.carry_angle, self.lower_speed),
        )
        .push("settle", MotionStep::Settle(seconds(self.lower_settle_s)))
        .push("open gripper", gripper(self.open_angle, self.gripper_speed))
        .push("settle", MotionStep::Settle(seconds(self.release_settle_s)))
        .push(
            "return home",
            cartesian(self.home, self.open_angle, self.speed),
        );
        plan
    }
}

// ── Drop ─────────────────────────────────────────────────────────────────

/// Release where the arm stands, then go to the rest pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropPlan {
    pub open_angle: f64,
    pub home: [f64; 3],
    pub gripper_speed: f64,
    pub speed: f64,
    pub release_settle_s: f64,
}

impl Default for DropPlan {
    fn default() -> Self {
        Self {
            open_angle: 3.14,
            home: [40.0, 1.0, 53.0],
            gripper_speed: 0.25,
            speed: 0.4,
            release_settle_s: 0.5,
        }
    }
}

impl DropPlan {
    pub fn build(&self) -> MotionPlan {
        let mut plan = MotionPlan::new("drop");
        plan.push("open gripper", gripper(self.open_angle, self.gripper_speed))
            .push("settle", MotionStep::Settle(seconds(self.release_settle_s)))
            .push("move to home", cartesian(self.home, self.open_angle, self.speed));
        plan
    }
}

/// The three action plans of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionPlans {
    pub pick: PickPlan,
    pub place: PlacePlan,
    pub drop: DropPlan,
}

impl ActionPlans {
    /// Same plans with every fixed pause removed.
    pub fn without_settles(mut self) -> Self {
        self.pick.approach_settle_s = 0.0;
        self.pick.grip_settle_s = 0.0;
        self.pick.lift_settle_s = 0.0;
        self.place.middle_settle_s = 0.0;
        self.place.lower_settle_s = 0.0;
        self.place.release_settle_s = 0.0;
        self.drop.release_settle_s = 0.0;
        self
    }
}
