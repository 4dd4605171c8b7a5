// Hub transport layer
//
// The hub is the module that the drive motors, intake motors, servos and IMU
// hang off. Everything above this layer talks to the `Hub` trait only:
// - `SerialHub`: real hub over a serial link
// - `SimHub`: in-memory hub for tests and `--sim` runs
// - `HardwareMap`: name -> device handle resolution

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod map;
pub mod serial;
pub mod sim;

pub use map::{DeviceEntry, HardwareMap};
pub use serial::SerialHub;
pub use sim::{HubCall, SimHub};

/// Number of motor ports covered by one bulk read
pub const MOTOR_PORTS: usize = 4;

/// Device classes known to the hardware map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Motor,
    Servo,
    Imu,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Motor => write!(f, "motor"),
            DeviceClass::Servo => write!(f, "servo"),
            DeviceClass::Imu => write!(f, "imu"),
        }
    }
}

/// Resolved motor: module address on the bus + motor port on that module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorHandle {
    pub name: String,
    pub module: u8,
    pub port: u8,
}

/// Resolved servo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoHandle {
    pub name: String,
    pub module: u8,
    pub port: u8,
}

/// Resolved orientation sensor (port is the module's I2C bus)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImuHandle {
    pub name: String,
    pub module: u8,
    pub port: u8,
}

/// Motor run modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Raw power, no onboard velocity loop
    RunWithoutEncoder = 0,
    /// Onboard closed-loop velocity control
    RunUsingEncoder = 1,
}

/// What a motor does when commanded zero power
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroPowerBehavior {
    Float = 0,
    Brake = 1,
}

/// Full PIDF coefficient set as stored by the hub per motor and run mode
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidfCoefficients {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub f: f64,
}

/// Angle unit the IMU reports orientation in
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    Radians = 0,
    Degrees = 1,
}

/// IMU initialization parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImuParameters {
    pub angle_unit: AngleUnit,
}

impl Default for ImuParameters {
    fn default() -> Self {
        Self {
            angle_unit: AngleUnit::Radians,
        }
    }
}

/// Axis remap register values (AXIS_MAP_CONFIG, AXIS_MAP_SIGN)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRemap {
    pub config: u8,
    pub signs: u8,
}

/// Intrinsic orientation angles, first angle is the heading after remap
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub first_angle: f64,
    pub second_angle: f64,
    pub third_angle: f64,
}

/// Raw result of one bulk read, indexed by motor port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkData {
    pub module: u8,
    pub positions: [i32; MOTOR_PORTS],
    pub velocities: [i32; MOTOR_PORTS],
}

impl BulkData {
    /// Encoder position of a motor, in ticks
    pub fn motor_position(&self, motor: &MotorHandle) -> i32 {
        self.positions[motor.port as usize]
    }

    /// Encoder velocity of a motor, in ticks per second
    pub fn motor_velocity(&self, motor: &MotorHandle) -> i32 {
        self.velocities[motor.port as usize]
    }
}

/// Hub firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Oldest firmware with working bulk reads
pub const MIN_FIRMWARE: FirmwareVersion = FirmwareVersion::new(1, 8, 2);

/// Error types for hub communication
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from module {module}: {reason}")]
    InvalidResponse { module: u8, reason: String },

    #[error("Checksum mismatch for module {module}")]
    ChecksumMismatch { module: u8 },

    #[error("Module {module} returned error status: 0x{status:02X}")]
    ModuleError { module: u8, status: u8 },

    #[error("Timeout waiting for response from module {module}")]
    Timeout { module: u8 },

    #[error("No bulk data available from module {module}")]
    NoBulkData { module: u8 },

    #[error("Module {module} firmware {found} is older than required {required}")]
    FirmwareTooOld {
        module: u8,
        found: FirmwareVersion,
        required: FirmwareVersion,
    },
}

pub type Result<T> = std::result::Result<T, HubError>;

/// Transport primitives the drive layer is built on.
///
/// All calls are blocking and complete within one bus round-trip.
pub trait Hub {
    /// Abort startup if any module runs firmware older than `MIN_FIRMWARE`
    fn ensure_minimum_firmware(&mut self) -> Result<()>;

    /// Read encoder positions and velocities of every motor port on `module`
    /// in a single request
    fn bulk_read(&mut self, module: u8) -> Result<BulkData>;

    fn set_motor_power(&mut self, motor: &MotorHandle, power: f64) -> Result<()>;

    fn set_motor_mode(&mut self, motor: &MotorHandle, mode: RunMode) -> Result<()>;

    fn set_zero_power_behavior(
        &mut self,
        motor: &MotorHandle,
        behavior: ZeroPowerBehavior,
    ) -> Result<()>;

    fn set_pidf(
        &mut self,
        motor: &MotorHandle,
        mode: RunMode,
        coefficients: PidfCoefficients,
    ) -> Result<()>;

    fn pidf(&mut self, motor: &MotorHandle, mode: RunMode) -> Result<PidfCoefficients>;

    /// Position is normalized to [0.0, 1.0]
    fn set_servo_position(&mut self, servo: &ServoHandle, position: f64) -> Result<()>;

    fn configure_imu(&mut self, imu: &ImuHandle, params: ImuParameters) -> Result<()>;

    fn remap_imu_axes(&mut self, imu: &ImuHandle, remap: AxisRemap) -> Result<()>;

    fn angular_orientation(&mut self, imu: &ImuHandle) -> Result<Orientation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_ordering() {
        assert!(FirmwareVersion::new(1, 8, 1) < MIN_FIRMWARE);
        assert!(FirmwareVersion::new(1, 7, 9) < MIN_FIRMWARE);
        assert!(FirmwareVersion::new(1, 8, 2) >= MIN_FIRMWARE);
        assert!(FirmwareVersion::new(2, 0, 0) > MIN_FIRMWARE);
        assert_eq!(MIN_FIRMWARE.to_string(), "1.8.2");
    }

    #[test]
    fn test_bulk_data_lookup_by_port() {
        let data = BulkData {
            module: 2,
            positions: [10, 20, 30, 40],
            velocities: [-1, -2, -3, -4],
        };
        let motor = MotorHandle {
            name: "rear_right".to_string(),
            module: 2,
            port: 2,
        };
        assert_eq!(data.motor_position(&motor), 30);
        assert_eq!(data.motor_velocity(&motor), -3);
    }
}
