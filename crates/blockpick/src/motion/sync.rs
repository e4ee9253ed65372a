//! Poll-until-stable motion completion.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{ArmAdapter, Feedback, HardwareError};

/// Polling parameters of the completion wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sleep between feedback polls, in seconds.
    pub poll_interval_s: f64,
    /// Largest per-poll change (rad or mm) still counted as "not moving".
    pub tolerance: f64,
    /// Consecutive quiet polls required to call the motion complete.
    pub stable_polls: u32,
    /// Upper bound on the whole wait, in seconds.
    pub timeout_s: f64,
    /// Feedback axes that are monitored.
    pub axes: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: 0.2,
            tolerance: 0.02,
            stable_polls: 3,
            timeout_s: 15.0,
            axes: ["b", "s", "e", "h", "x", "y", "z"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_s)
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_s)
    }
}

/// Non-finite or negative values collapse to zero.
pub(crate) fn seconds(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO)
}

/// How a completion wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Feedback stayed within tolerance for the required number of polls.
    Settled { polls: u32 },
    /// The arm kept moving past the timeout; the caller proceeds anyway.
    TimedOut { polls: u32, elapsed: Duration },
    /// A poll failed or carried no monitored axis; waiting stopped at once.
    FeedbackLost { polls: u32, error: HardwareError },
}

impl SyncOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }

    pub fn polls(&self) -> u32 {
        match self {
            Self::Settled { polls }
            | Self::TimedOut { polls, .. }
            | Self::FeedbackLost { polls, .. } => *polls,
        }
    }
}

/// Blocks until the arm reports it has stopped moving.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionSynchronizer {
    config: SyncConfig,
}

impl MotionSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Poll `arm` until its monitored axes settle, the timeout passes, or
    /// feedback is lost.
    ///
    /// The first successful poll only seeds the comparison. A timeout is not
    /// an error: it is logged and reported so the sequence can continue.
    pub fn wait<A: ArmAdapter + ?Sized>(&self, arm: &mut A) -> SyncOutcome {
        let cfg = &self.config;
        let interval = cfg.poll_interval();
        let timeout = cfg.timeout();
        let start = Instant::now();

        let mut previous: Option<Feedback> = None;
        let mut stable = 0u32;
        let mut polls = 0u32;

        loop {
            let current = match self.poll(arm) {
                Ok(fb) => fb,
                Err(error) => {
                    tracing::warn!(polls, %error, "feedback lost while waiting for motion");
                    return SyncOutcome::FeedbackLost { polls, error };
                }
            };
            polls += 1;

            if let Some(prev) = &previous {
                let delta = current.max_abs_delta(prev);
                if delta < cfg.tolerance {
                    stable += 1;
                } else {
                    stable = 0;
                }
                tracing::trace!(polls, delta, stable, "motion poll");

                if stable >= cfg.stable_polls {
                    return SyncOutcome::Settled { polls };
                }
                let elapsed = start.elapsed();
                if elapsed > timeout {
                    tracing::warn!(
                        polls,
                        elapsed_s = elapsed.as_secs_f64(),
                        "motion did not settle before timeout; continuing"
                    );
                    return SyncOutcome::TimedOut { polls, elapsed };
                }
            }

            previous = Some(current);
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
    }

    fn poll<A: ArmAdapter + ?Sized>(&self, arm: &mut A) -> Result<Feedback, HardwareError> {
        let fb = arm.feedback()?.restricted_to(&self.config.axes);
        if fb.is_empty() {
            return Err(HardwareError::InvalidResponse(
                "feedback carries no monitored axis".to_string(),
            ));
        }
        Ok(fb)
    }
}
