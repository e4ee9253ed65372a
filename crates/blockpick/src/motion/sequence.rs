//! Step-by-step execution of a motion plan.

use std::time::Duration;

use super::sync::{MotionSynchronizer, SyncOutcome};
use super::{ArmAdapter, HardwareError, MotionTarget};

/// One primitive of a motion plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionStep {
    Joint {
        joint: u8,
        angle: f64,
        speed: f64,
        wait: bool,
    },
    Cartesian(MotionTarget),
    /// Fixed pause, e.g. to let the gripper close on the block.
    Settle(Duration),
}

/// Named, ordered list of steps, each with a short label used in errors.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlan {
    name: &'static str,
    steps: Vec<(&'static str, MotionStep)>,
}

impl MotionPlan {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, label: &'static str, step: MotionStep) -> &mut Self {
        self.steps.push((label, step));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[(&'static str, MotionStep)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A primitive move failed; the remaining steps were not issued.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceError {
    /// 1-based step index; 0 is the torque-enable preamble.
    pub step: usize,
    pub label: &'static str,
    pub source: HardwareError,
}

impl std::fmt::Display for SequenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to {} (step {}): {}", self.label, self.step, self.source)
    }
}

impl std::error::Error for SequenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Summary of a completed plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceReport {
    pub steps: usize,
    pub settled: usize,
    pub timed_out: usize,
}

impl SequenceReport {
    /// `true` when every completion wait settled.
    pub fn fully_confirmed(&self) -> bool {
        self.timed_out == 0
    }
}

/// Issues plan steps against an arm, one at a time.
#[derive(Debug)]
pub struct MotionSequencer<A> {
    arm: A,
    sync: MotionSynchronizer,
}

impl<A: ArmAdapter> MotionSequencer<A> {
    pub fn new(arm: A, sync: MotionSynchronizer) -> Self {
        Self { arm, sync }
    }

    pub fn arm(&self) -> &A {
        &self.arm
    }

    pub fn arm_mut(&mut self) -> &mut A {
        &mut self.arm
    }

    pub fn into_arm(self) -> A {
        self.arm
    }

    pub fn synchronizer(&self) -> &MotionSynchronizer {
        &self.sync
    }

    /// Enable torque, then run every step of `plan` in order.
    ///
    /// Steps flagged `wait` block in the synchronizer after the command is
    /// accepted. A timed-out wait is counted in the report and the plan
    /// goes on. A rejected command or lost feedback aborts the plan.
    pub fn run(&mut self, plan: &MotionPlan) -> Result<SequenceReport, SequenceError> {
        self.arm.set_torque(true).map_err(|source| SequenceError {
            step: 0,
            label: "enable torque",
            source,
        })?;

        let mut report = SequenceReport::default();
        for (i, &(label, step)) in plan.steps().iter().enumerate() {
            tracing::debug!(plan = plan.name(), step = i + 1, label, "motion step");
            let wait = self.issue(&step).map_err(|source| SequenceError {
                step: i + 1,
                label,
                source,
            })?;
            if wait {
                match self.sync.wait(&mut self.arm) {
                    SyncOutcome::Settled { .. } => report.settled += 1,
                    SyncOutcome::TimedOut { .. } => report.timed_out += 1,
                    SyncOutcome::FeedbackLost { error, .. } => {
                        return Err(SequenceError {
                            step: i + 1,
                            label,
                            source: error,
                        });
                    }
                }
            }
            report.steps += 1;
        }

        if !report.fully_confirmed() {
            tracing::warn!(
                plan = plan.name(),
                timed_out = report.timed_out,
                "plan finished without confirmed completion of every move"
            );
        }
        Ok(report)
    }

    /// Returns whether the step asks for a completion wait.
    fn issue(&mut self, step: &MotionStep) -> Result<bool, HardwareError> {
        match *step {
            MotionStep::Joint {
                joint,
                angle,
                speed,
                wait,
            } => {
                self.arm.set_joint_angle(joint, angle, speed)?;
                Ok(wait)
            }
            MotionStep::Cartesian(t) => {
                self.arm.move_cartesian(t.x, t.y, t.z, t.t, t.speed)?;
                Ok(t.wait)
            }
            MotionStep::Settle(d) => {
                if !d.is_zero() {
                    std::thread::sleep(d);
                }
                Ok(false)
            }
        }
    }

    /// Disable torque immediately, outside of any plan.
    pub fn emergency_stop(&mut self) -> Result<(), HardwareError> {
        tracing::warn!("emergency stop");
        self.arm.emergency_stop()
    }
}
