//! Holding/empty gate over physical actions.
//!
//! `pick` is admitted only with an empty gripper, `place` and `drop` only
//! while holding. The state changes only after the motion plan completed;
//! a rejected request never reaches the arm.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detector::ColorTargets;
use crate::motion::{
    ActionPlans, ArmAdapter, HardwareError, MotionPlan, MotionSequencer, MotionSynchronizer,
    PickPlan,
};

// ── State and vocabulary ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    #[default]
    Empty,
    Holding,
}

impl std::fmt::Display for ArmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Holding => "holding",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Pick,
    Place,
    Drop,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Place => "place",
            Self::Drop => "drop",
        }
    }

    /// State required before the action and reached after it.
    pub fn transition(self) -> (ArmState, ArmState) {
        match self {
            Self::Pick => (ArmState::Empty, ArmState::Holding),
            Self::Place | Self::Drop => (ArmState::Holding, ArmState::Empty),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action name is not one of `pick`, `place`, `drop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidActionError {
    pub name: String,
}

impl std::fmt::Display for InvalidActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown action {:?} (expected pick, place or drop)",
            self.name
        )
    }
}

impl std::error::Error for InvalidActionError {}

impl FromStr for Action {
    type Err = InvalidActionError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pick" => Ok(Self::Pick),
            "place" => Ok(Self::Place),
            "drop" => Ok(Self::Drop),
            _ => Err(InvalidActionError {
                name: s.to_string(),
            }),
        }
    }
}

// ── Requests and outcomes ────────────────────────────────────────────────

/// Inputs of one action. Only `pick` reads them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionRequest {
    /// Color to pick. Required for `pick`.
    pub color: Option<String>,
    pub targets: Option<ColorTargets>,
}

impl ActionRequest {
    pub fn pick(color: Option<&str>, targets: ColorTargets) -> Self {
        Self {
            color: color.map(str::to_string),
            targets: Some(targets),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The plan ran to the end and the state moved.
    Completed,
    /// Wrong state for the action; nothing was sent to the arm.
    Rejected,
    /// The plan could not start or a move failed; state kept.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub message: String,
    /// State after the call.
    pub state: ArmState,
}

impl ActionOutcome {
    pub fn success(&self) -> bool {
        self.status == ActionStatus::Completed
    }
}

// ── Gate ─────────────────────────────────────────────────────────────────

/// Admission control in front of the motion sequencer.
#[derive(Debug)]
pub struct ActionGate<A> {
    state: ArmState,
    plans: ActionPlans,
    sequencer: MotionSequencer<A>,
}

impl<A: ArmAdapter> ActionGate<A> {
    pub fn new(arm: A, sync: MotionSynchronizer, plans: ActionPlans) -> Self {
        Self {
            state: ArmState::Empty,
            plans,
            sequencer: MotionSequencer::new(arm, sync),
        }
    }

    /// Start from a known state instead of `Empty`.
    pub fn with_state(mut self, state: ArmState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    pub fn is_holding(&self) -> bool {
        self.state == ArmState::Holding
    }

    /// Force the gate back to `Empty` after manual intervention.
    pub fn reset_state(&mut self) {
        tracing::info!(previous = %self.state, "arm state reset");
        self.state = ArmState::Empty;
    }

    pub fn plans(&self) -> &ActionPlans {
        &self.plans
    }

    pub fn arm(&self) -> &A {
        self.sequencer.arm()
    }

    pub fn arm_mut(&mut self) -> &mut A {
        self.sequencer.arm_mut()
    }

    pub fn into_arm(self) -> A {
        self.sequencer.into_arm()
    }

    /// Disable torque now, whatever the state. The state is left as is.
    pub fn emergency_stop(&mut self) -> Result<(), HardwareError> {
        self.sequencer.emergency_stop()
    }

    /// Parse `action_name` and run it if the current state admits it.
    ///
    /// An unknown name is the only error; every other result, including
    /// hardware failures, is reported in the outcome.
    pub fn execute(
        &mut self,
        action_name: &str,
        request: &ActionRequest,
    ) -> Result<ActionOutcome, InvalidActionError> {
        let action: Action = action_name.parse()?;
        Ok(self.execute_action(action, request))
    }

    pub fn execute_action(&mut self, action: Action, request: &ActionRequest) -> ActionOutcome {
        let (from, to) = action.transition();
        if self.state != from {
            let message = match action {
                Action::Pick => "no-op: already have block",
                Action::Place => "no-op: no block to place",
                Action::Drop => "no-op: no block to drop",
            };
            tracing::info!(%action, state = %self.state, "action rejected");
            return self.outcome(ActionStatus::Rejected, message.to_string());
        }

        let (plan, done) = match self.plan_for(action, request) {
            Ok(p) => p,
            Err(message) => {
                tracing::warn!(%action, %message, "action could not start");
                return self.outcome(ActionStatus::Failed, message);
            }
        };

        match self.sequencer.run(&plan) {
            Ok(report) => {
                self.state = to;
                tracing::info!(
                    %action,
                    state = %self.state,
                    steps = report.steps,
                    confirmed = report.fully_confirmed(),
                    "action completed"
                );
                self.outcome(ActionStatus::Completed, done)
            }
            Err(err) => {
                tracing::warn!(%action, error = %err, state = %self.state, "action failed");
                self.outcome(ActionStatus::Failed, err.to_string())
            }
        }
    }

    /// The plan for `action` and its success message.
    fn plan_for(
        &self,
        action: Action,
        request: &ActionRequest,
    ) -> Result<(MotionPlan, String), String> {
        match action {
            Action::Pick => {
                let empty = ColorTargets::new();
                let targets = request.targets.as_ref().unwrap_or(&empty);
                let (color, target) = PickPlan::select_target(targets, request.color.as_deref())
                    .map_err(|e| e.to_string())?;
                let home = self.plans.pick.home;
                Ok((
                    self.plans.pick.build(target),
                    format!(
                        "picked {color} and returned home ({}, {}, {})",
                        home[0], home[1], home[2]
                    ),
                ))
            }
            Action::Place => Ok((
                self.plans.place.build(),
                "Object placed successfully".to_string(),
            )),
            Action::Drop => Ok((
                self.plans.drop.build(),
                "Dropped and moved to home".to_string(),
            )),
        }
    }

    fn outcome(&self, status: ActionStatus, message: String) -> ActionOutcome {
        ActionOutcome {
            status,
            message,
            state: self.state,
        }
    }
}
