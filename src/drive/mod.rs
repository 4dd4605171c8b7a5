// Drivetrain HAL for the mecanum base
//
// Provides:
// - Device registry (every handle resolved once, in a fixed order)
// - Bulk telemetry in wheel order, converted to inches
// - Per-wheel and intake power mapping
// - Uniform velocity gains across the drive motors
// - IMU heading

mod gains;
mod heading;
pub mod imu;
mod mecanum;
pub mod registry;
pub mod telemetry;
pub mod units;
pub mod wheel;

pub use gains::VelocityGains;
pub use imu::{AxesOrder, AxesSigns, AxisRemapConfig};
pub use mecanum::MecanumDrive;
pub use registry::{DeviceRegistry, DriveMotor, ServoHomes, ServoId};
pub use telemetry::{TelemetryFrame, TelemetrySnapshot, WheelState};
pub use units::WheelGeometry;
pub use wheel::{Direction, PerWheel, Wheel};

use crate::hub::{DeviceClass, HubError};

/// Error types for the drive layer
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Device '{name}' ({class}) not found in hardware map")]
    DeviceNotFound { name: String, class: DeviceClass },

    #[error("Device '{name}' is a {found}, expected a {expected}")]
    WrongDeviceClass {
        name: String,
        expected: DeviceClass,
        found: DeviceClass,
    },

    #[error("Drive motor '{name}' is on port {port}, bulk reads only cover ports 0-3")]
    InvalidMotorPort { name: String, port: u8 },

    #[error("Drive motor '{name}' is on module {found}, the other drive motors are on {expected}")]
    DriveMotorsSplit {
        name: String,
        expected: u8,
        found: u8,
    },

    #[error("Servo position {position} is outside [0, 1]")]
    ServoPositionOutOfRange { position: f64 },

    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}
