// Message types for the runtime

use serde::{Deserialize, Serialize};

use crate::drive::{PerWheel, WheelState};

// Command from the motion controller -> runtime
// Wheel powers are already mixed, one per wheel in wheel order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    pub wheels: PerWheel<f64>,
    #[serde(default)]
    pub intake: f64,
}

// Telemetry from runtime -> localizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveTelemetry {
    /// Wheel positions in inches, wheel order
    pub positions: PerWheel<f64>,
    /// Wheel velocities in inches per hub time base, wheel order
    pub velocities: PerWheel<f64>,
    /// Heading in radians, `None` if the IMU read failed this cycle
    pub heading: Option<f64>,
    /// True when the bulk read failed and the wheel values are zero fill
    pub stale: bool,
}

impl DriveTelemetry {
    pub fn new(state: WheelState, heading: Option<f64>) -> Self {
        Self {
            positions: state.positions,
            velocities: state.velocities,
            heading,
            stale: state.stale,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    HubFault,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_intake_defaults_to_zero() {
        let cmd: DriveCommand = serde_json::from_str(r#"{ "wheels": [0.5, 0.5, -0.5, -0.5] }"#).unwrap();
        assert_eq!(cmd.wheels.into_array(), [0.5, 0.5, -0.5, -0.5]);
        assert_eq!(cmd.intake, 0.0);
    }

    #[test]
    fn test_command_needs_four_wheels() {
        assert!(serde_json::from_str::<DriveCommand>(r#"{ "wheels": [0.5, 0.5] }"#).is_err());
    }

    #[test]
    fn test_health_json() {
        assert_eq!(
            serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(),
            "\"cmd_stale\""
        );
    }
}
