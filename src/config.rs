// Timeouts, topics, drive calibration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::drive::{AxisRemapConfig, ServoHomes, VelocityGains, WheelGeometry};
use crate::hub::{HardwareMap, RunMode};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "robot/cmd/drive"; // wheel + intake powers
pub const TOPIC_CMD_GAINS: &str = "robot/cmd/gains"; // velocity PID gains
pub const TOPIC_STATE_DRIVE: &str = "robot/state/drive"; // wheel telemetry + heading
pub const TOPIC_HEALTH: &str = "robot/state/health"; // health status

// Serial port for the hub
pub const HUB_PORT: &str = "/dev/ttyUSB0";

// Encoder rate at full power for --sim runs (435 rpm motor, 383.6 ticks/rev)
pub const SIM_TICKS_PER_SECOND: f64 = 2781.1;

/// Drivetrain calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConstants {
    /// Encoder ticks per motor revolution
    pub ticks_per_rev: f64,
    /// Motor free speed, used for the velocity feed-forward
    pub max_rpm: f64,
    /// Wheel radius in inches
    pub wheel_radius: f64,
    /// Output (wheel) speed / input (motor) speed
    pub gear_ratio: f64,
    /// Use the hub's closed-loop velocity control on the drive motors
    pub run_using_encoder: bool,
    /// Gains applied at init when closed-loop control is on; `None` keeps
    /// the hub defaults
    pub motor_velo_pid: Option<VelocityGains>,
}

impl Default for DriveConstants {
    fn default() -> Self {
        Self {
            ticks_per_rev: 383.6,
            max_rpm: 435.0,
            wheel_radius: 2.0,
            gear_ratio: 1.0,
            run_using_encoder: true,
            motor_velo_pid: None,
        }
    }
}

impl DriveConstants {
    pub fn geometry(&self) -> WheelGeometry {
        WheelGeometry {
            ticks_per_rev: self.ticks_per_rev,
            wheel_radius: self.wheel_radius,
            gear_ratio: self.gear_ratio,
        }
    }

    /// Run mode for the drive motors
    pub fn drive_run_mode(&self) -> RunMode {
        if self.run_using_encoder {
            RunMode::RunUsingEncoder
        } else {
            RunMode::RunWithoutEncoder
        }
    }

    /// Feed-forward for the hub's velocity loop: full scale command over
    /// max encoder rate. Zero when the motor runs open loop.
    pub fn velocity_feedforward(&self, mode: RunMode) -> f64 {
        match mode {
            RunMode::RunUsingEncoder => 32767.0 / (self.max_rpm / 60.0 * self.ticks_per_rev),
            RunMode::RunWithoutEncoder => 0.0,
        }
    }

    /// Calibration values must be positive and finite; zero ticks per rev
    /// would turn every distance into NaN
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("ticks_per_rev", self.ticks_per_rev),
            ("max_rpm", self.max_rpm),
            ("wheel_radius", self.wheel_radius),
            ("gear_ratio", self.gear_ratio),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

/// Everything needed to bring up the drivetrain
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub constants: DriveConstants,
    pub hardware: HardwareMap,
    pub servo_homes: ServoHomes,
    pub imu_remap: AxisRemapConfig,
}

/// Error types for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("constants.{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

impl RobotConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading robot config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.constants.validate()?;
        Ok(config)
    }

    /// Hub module addresses referenced by the hardware map
    pub fn modules(&self) -> Vec<u8> {
        self.hardware.modules()
    }
}
