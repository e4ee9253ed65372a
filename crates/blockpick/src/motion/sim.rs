//! In-process arm model for dry runs and tests.
//!
//! Each feedback poll moves every axis a fixed fraction of its remaining
//! distance toward the last commanded target, so moves settle after a
//! predictable number of polls.

use std::collections::BTreeMap;

use super::{ArmAdapter, Feedback, HardwareError};

/// Command kinds as seen by the arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmCommand {
    Cartesian {
        x: f64,
        y: f64,
        z: f64,
        t: f64,
        speed: f64,
    },
    Joint {
        joint: u8,
        angle: f64,
        speed: f64,
    },
    Torque(bool),
    Stop,
}

/// First-order simulated arm.
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    position: BTreeMap<&'static str, f64>,
    target: BTreeMap<&'static str, f64>,
    step_fraction: f64,
    torque: bool,
    commands: Vec<ArmCommand>,
    polls: usize,
    fail_command_at: Option<usize>,
    fail_feedback_after: Option<usize>,
}

/// Resting pose: home (200, 0, 150) with the gripper closed.
const REST_POSE: [(&str, f64); 8] = [
    ("b", 0.0),
    ("s", 0.0),
    ("e", 1.57),
    ("h", 3.14),
    ("x", 200.0),
    ("y", 0.0),
    ("z", 150.0),
    ("t", 3.14),
];

const SNAP: f64 = 1e-3;

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedArm {
    pub fn new() -> Self {
        let pose: BTreeMap<_, _> = REST_POSE.into_iter().collect();
        Self {
            target: pose.clone(),
            position: pose,
            step_fraction: 0.5,
            torque: false,
            commands: Vec::new(),
            polls: 0,
            fail_command_at: None,
            fail_feedback_after: None,
        }
    }

    /// Fraction of the remaining distance covered per poll, clamped to (0, 1].
    pub fn with_step_fraction(mut self, fraction: f64) -> Self {
        self.step_fraction = if fraction.is_finite() {
            fraction.clamp(1e-3, 1.0)
        } else {
            1.0
        };
        self
    }

    /// Fail the motion command with this zero-based index (torque and stop
    /// commands included).
    pub fn fail_command(mut self, index: usize) -> Self {
        self.fail_command_at = Some(index);
        self
    }

    /// Fail every feedback poll after `polls` successful ones.
    pub fn fail_feedback_after(mut self, polls: usize) -> Self {
        self.fail_feedback_after = Some(polls);
        self
    }

    /// Commands accepted so far, in order.
    pub fn commands(&self) -> &[ArmCommand] {
        &self.commands
    }

    pub fn feedback_polls(&self) -> usize {
        self.polls
    }

    pub fn torque_enabled(&self) -> bool {
        self.torque
    }

    /// Current value of one axis.
    pub fn axis(&self, name: &str) -> Option<f64> {
        self.position.get(name).copied()
    }

    fn accept(&mut self, command: ArmCommand) -> Result<(), HardwareError> {
        let index = self.commands.len();
        if self.fail_command_at == Some(index) {
            self.fail_command_at = None;
            return Err(HardwareError::Transport(format!(
                "simulated failure on command #{index}"
            )));
        }
        self.commands.push(command);
        Ok(())
    }

    fn advance(&mut self) {
        for (axis, pos) in self.position.iter_mut() {
            let goal = self.target.get(axis).copied().unwrap_or(*pos);
            let remaining = goal - *pos;
            *pos = if remaining.abs() < SNAP {
                goal
            } else {
                *pos + remaining * self.step_fraction
            };
        }
    }
}

impl ArmAdapter for SimulatedArm {
    fn feedback(&mut self) -> Result<Feedback, HardwareError> {
        if self.fail_feedback_after.is_some_and(|n| self.polls >= n) {
            return Err(HardwareError::Transport("simulated feedback loss".into()));
        }
        self.polls += 1;
        if self.torque {
            self.advance();
        }
        Ok(self.position.iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn move_cartesian(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        t: f64,
        speed: f64,
    ) -> Result<(), HardwareError> {
        self.accept(ArmCommand::Cartesian { x, y, z, t, speed })?;
        self.target.insert("x", x);
        self.target.insert("y", y);
        self.target.insert("z", z);
        self.target.insert("t", t);
        self.target.insert("h", t);
        Ok(())
    }

    fn set_joint_angle(&mut self, joint: u8, angle: f64, speed: f64) -> Result<(), HardwareError> {
        let axis = match joint {
            1 => "b",
            2 => "s",
            3 => "e",
            4 => "h",
            other => {
                return Err(HardwareError::InvalidResponse(format!(
                    "unknown joint {other}"
                )))
            }
        };
        self.accept(ArmCommand::Joint {
            joint,
            angle,
            speed,
        })?;
        self.target.insert(axis, angle);
        if axis == "h" {
            self.target.insert("t", angle);
        }
        Ok(())
    }

    fn set_torque(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.accept(ArmCommand::Torque(enabled))?;
        self.torque = enabled;
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), HardwareError> {
        self.accept(ArmCommand::Stop)?;
        self.torque = false;
        // Freeze in place.
        self.target = self.position.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axes_do_not_move_without_torque() {
        let mut arm = SimulatedArm::new();
        arm.move_cartesian(0.0, 0.0, 0.0, 1.57, 0.4).unwrap();
        let fb = arm.feedback().unwrap();
        assert_relative_eq!(fb.get("x").unwrap(), 200.0);
    }

    #[test]
    fn each_poll_halves_the_remaining_distance() {
        let mut arm = SimulatedArm::new();
        arm.set_torque(true).unwrap();
        arm.move_cartesian(100.0, 0.0, 150.0, 3.14, 0.4).unwrap();
        assert_relative_eq!(arm.feedback().unwrap().get("x").unwrap(), 150.0);
        assert_relative_eq!(arm.feedback().unwrap().get("x").unwrap(), 125.0);
    }

    #[test]
    fn gripper_joint_drives_the_tool_angle() {
        let mut arm = SimulatedArm::new().with_step_fraction(1.0);
        arm.set_torque(true).unwrap();
        arm.set_joint_angle(4, 1.57, 0.25).unwrap();
        let fb = arm.feedback().unwrap();
        assert_relative_eq!(fb.get("h").unwrap(), 1.57);
        assert_relative_eq!(fb.get("t").unwrap(), 1.57);
    }

    #[test]
    fn scripted_command_failure_is_not_recorded() {
        let mut arm = SimulatedArm::new().fail_command(1);
        arm.set_torque(true).unwrap();
        assert!(arm.move_cartesian(1.0, 2.0, 3.0, 3.14, 0.4).is_err());
        arm.move_cartesian(1.0, 2.0, 3.0, 3.14, 0.4).unwrap();
        assert_eq!(arm.commands().len(), 2);
    }

    #[test]
    fn unknown_joint_is_rejected() {
        let mut arm = SimulatedArm::new();
        assert!(arm.set_joint_angle(9, 0.0, 0.25).is_err());
        assert!(arm.commands().is_empty());
    }

    #[test]
    fn emergency_stop_freezes_and_releases_torque() {
        let mut arm = SimulatedArm::new();
        arm.set_torque(true).unwrap();
        arm.move_cartesian(0.0, 0.0, 0.0, 3.14, 0.4).unwrap();
        arm.feedback().unwrap();
        arm.emergency_stop().unwrap();
        assert!(!arm.torque_enabled());
        let x = arm.axis("x").unwrap();
        arm.set_torque(true).unwrap();
        assert_relative_eq!(arm.feedback().unwrap().get("x").unwrap(), x);
        assert_eq!(arm.commands().last(), Some(&ArmCommand::Torque(true)));
    }

    #[test]
    fn feedback_failure_after_budget() {
        let mut arm = SimulatedArm::new().fail_feedback_after(2);
        assert!(arm.feedback().is_ok());
        assert!(arm.feedback().is_ok());
        assert!(arm.feedback().is_err());
        assert_eq!(arm.feedback_polls(), 2);
    }
}
