//! JSON command protocol of the RoArm-M2 firmware.
//!
//! Every command is a single JSON object tagged by a numeric `T` code and
//! answered with a JSON reply. How the text travels (HTTP query string,
//! serial line) is left to a [`Transport`].

use std::time::Duration;

use serde_json::{json, Value};

use super::{ArmAdapter, Feedback, HardwareError};

/// Command codes understood by the firmware.
pub mod codes {
    pub const EMERGENCY_STOP: u32 = 0;
    pub const JOINT_ANGLE: u32 = 101;
    pub const CARTESIAN: u32 = 104;
    pub const FEEDBACK: u32 = 105;
    pub const TORQUE: u32 = 210;
}

/// Sends one encoded command and returns the raw reply text.
pub trait Transport {
    fn request(&mut self, command: &str) -> Result<String, HardwareError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn request(&mut self, command: &str) -> Result<String, HardwareError> {
        (**self).request(command)
    }
}

/// RoArm-M2 driver over any transport.
#[derive(Debug)]
pub struct RoArm<T> {
    transport: T,
    torque_settle: Duration,
}

impl<T: Transport> RoArm<T> {
    /// Default torque settle of 500 ms, the relay switching time.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            torque_settle: Duration::from_millis(500),
        }
    }

    pub fn with_torque_settle(mut self, settle: Duration) -> Self {
        self.torque_settle = settle;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn send(&mut self, command: Value) -> Result<String, HardwareError> {
        let text = command.to_string();
        tracing::trace!(command = %text, "roarm request");
        self.transport.request(&text)
    }
}

/// Numeric fields of a feedback reply. Non-numeric fields are dropped.
pub fn parse_feedback(reply: &str) -> Result<Feedback, HardwareError> {
    let value: Value = serde_json::from_str(reply)
        .map_err(|e| HardwareError::InvalidResponse(format!("feedback is not JSON: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(HardwareError::InvalidResponse(
            "feedback is not a JSON object".to_string(),
        ));
    };
    Ok(fields
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|f| (k, f)))
        .collect())
}

impl<T: Transport> ArmAdapter for RoArm<T> {
    fn feedback(&mut self) -> Result<Feedback, HardwareError> {
        let reply = self.send(json!({ "T": codes::FEEDBACK }))?;
        parse_feedback(&reply)
    }

    fn move_cartesian(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        t: f64,
        speed: f64,
    ) -> Result<(), HardwareError> {
        self.send(json!({
            "T": codes::CARTESIAN,
            "x": x,
            "y": y,
            "z": z,
            "t": t,
            "spd": speed,
        }))?;
        Ok(())
    }

    fn set_joint_angle(&mut self, joint: u8, angle: f64, speed: f64) -> Result<(), HardwareError> {
        self.send(json!({
            "T": codes::JOINT_ANGLE,
            "joint": joint,
            "angle": angle,
            "spd": speed,
        }))?;
        Ok(())
    }

    fn set_torque(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.send(json!({ "T": codes::TORQUE, "cmd": u8::from(enabled) }))?;
        if !self.torque_settle.is_zero() {
            std::thread::sleep(self.torque_settle);
        }
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), HardwareError> {
        self.send(json!({ "T": codes::EMERGENCY_STOP }))?;
        Ok(())
    }
}
