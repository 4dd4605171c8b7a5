// Device registry: every hardware handle the drivetrain uses, resolved once

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::DriveError;
use super::wheel::{Direction, PerWheel, Wheel};
use crate::hub::map::LookupError;
use crate::hub::{DeviceClass, HardwareMap, ImuHandle, MOTOR_PORTS, MotorHandle, ServoHandle};

/// Hardware map name of the orientation sensor
pub const IMU_NAME: &str = "imu";

/// Hardware map names of the intake motors
pub const INTAKE_NAMES: [&str; 2] = ["intake_left", "intake_right"];

/// Position servos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoId {
    LeftGrab = 0,
    RightGrab = 1,
    LeftArm = 2,
    RightArm = 3,
    LeftTray = 4,
    RightTray = 5,
}

impl ServoId {
    pub const ALL: [ServoId; 6] = [
        ServoId::LeftGrab,
        ServoId::RightGrab,
        ServoId::LeftArm,
        ServoId::RightArm,
        ServoId::LeftTray,
        ServoId::RightTray,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn device_name(self) -> &'static str {
        match self {
            ServoId::LeftGrab => "leftGrab",
            ServoId::RightGrab => "rightGrab",
            ServoId::LeftArm => "leftArm",
            ServoId::RightArm => "rightArm",
            ServoId::LeftTray => "leftTray",
            ServoId::RightTray => "rightTray",
        }
    }
}

/// Positions pushed to the servos at the end of init
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoHomes {
    /// 0.4 open, 0.6 closed
    pub left_grab: f64,
    /// 0.6 open, 0.4 closed
    pub right_grab: f64,
    /// 0 down, 1 up
    pub left_arm: f64,
    /// 0 up, 1 down
    pub right_arm: f64,
    /// 0 up, 1 down
    pub left_tray: f64,
    /// 0 down, 1 up
    pub right_tray: f64,
}

impl Default for ServoHomes {
    fn default() -> Self {
        Self {
            left_grab: 0.4,
            right_grab: 0.6,
            left_arm: 1.0,
            right_arm: 0.0,
            left_tray: 0.0,
            right_tray: 1.0,
        }
    }
}

impl ServoHomes {
    pub fn get(&self, servo: ServoId) -> f64 {
        match servo {
            ServoId::LeftGrab => self.left_grab,
            ServoId::RightGrab => self.right_grab,
            ServoId::LeftArm => self.left_arm,
            ServoId::RightArm => self.right_arm,
            ServoId::LeftTray => self.left_tray,
            ServoId::RightTray => self.right_tray,
        }
    }

    /// Every home must be a normalized servo position
    pub fn validate(&self) -> Result<(), DriveError> {
        for servo in ServoId::ALL {
            check_servo_position(self.get(servo)).inspect_err(|_| {
                warn!("Home position for {} is outside [0, 1]", servo.device_name());
            })?;
        }
        Ok(())
    }
}

pub(crate) fn check_servo_position(position: f64) -> Result<(), DriveError> {
    if (0.0..=1.0).contains(&position) {
        Ok(())
    } else {
        Err(DriveError::ServoPositionOutOfRange { position })
    }
}

/// A drive motor together with its mounting direction
#[derive(Debug, Clone, PartialEq)]
pub struct DriveMotor {
    pub handle: MotorHandle,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    imu: ImuHandle,
    drive: PerWheel<DriveMotor>,
    drive_module: u8,
    intake: [MotorHandle; 2],
    servos: [ServoHandle; 6],
}

fn lookup_error(name: &str, class: DeviceClass, err: LookupError) -> DriveError {
    match err {
        LookupError::NotFound => DriveError::DeviceNotFound {
            name: name.to_string(),
            class,
        },
        LookupError::WrongClass(found) => DriveError::WrongDeviceClass {
            name: name.to_string(),
            expected: class,
            found,
        },
    }
}

impl DeviceRegistry {
    /// Resolve every device by name. Touches no hardware, so a failure here
    /// leaves nothing half-configured.
    pub fn resolve(map: &HardwareMap) -> Result<Self, DriveError> {
        let imu = map
            .resolve_imu(IMU_NAME)
            .map_err(|e| lookup_error(IMU_NAME, DeviceClass::Imu, e))?;

        let resolve_wheel = |wheel: Wheel| -> Result<DriveMotor, DriveError> {
            let name = wheel.device_name();
            let handle = map
                .resolve_motor(name)
                .map_err(|e| lookup_error(name, DeviceClass::Motor, e))?;
            Ok(DriveMotor {
                handle,
                direction: wheel.direction(),
            })
        };
        let drive = PerWheel::new(
            resolve_wheel(Wheel::FrontLeft)?,
            resolve_wheel(Wheel::RearLeft)?,
            resolve_wheel(Wheel::RearRight)?,
            resolve_wheel(Wheel::FrontRight)?,
        );
        let drive_module = Self::check_bulk_layout(&drive)?;

        let [left, right] = INTAKE_NAMES;
        let intake = [
            map.resolve_motor(left)
                .map_err(|e| lookup_error(left, DeviceClass::Motor, e))?,
            map.resolve_motor(right)
                .map_err(|e| lookup_error(right, DeviceClass::Motor, e))?,
        ];

        let resolve_servo = |servo: ServoId| {
            let name = servo.device_name();
            map.resolve_servo(name)
                .map_err(|e| lookup_error(name, DeviceClass::Servo, e))
        };
        let servos = [
            resolve_servo(ServoId::LeftGrab)?,
            resolve_servo(ServoId::RightGrab)?,
            resolve_servo(ServoId::LeftArm)?,
            resolve_servo(ServoId::RightArm)?,
            resolve_servo(ServoId::LeftTray)?,
            resolve_servo(ServoId::RightTray)?,
        ];

        Ok(Self {
            imu,
            drive,
            drive_module,
            intake,
            servos,
        })
    }

    /// One bulk read covers the motor ports of one module, so all four drive
    /// motors have to share a module and sit on ports 0-3
    fn check_bulk_layout(drive: &PerWheel<DriveMotor>) -> Result<u8, DriveError> {
        let module = drive[Wheel::FrontLeft].handle.module;
        for (_, motor) in drive.iter() {
            if motor.handle.port as usize >= MOTOR_PORTS {
                return Err(DriveError::InvalidMotorPort {
                    name: motor.handle.name.clone(),
                    port: motor.handle.port,
                });
            }
            if motor.handle.module != module {
                return Err(DriveError::DriveMotorsSplit {
                    name: motor.handle.name.clone(),
                    expected: module,
                    found: motor.handle.module,
                });
            }
        }
        Ok(module)
    }

    pub fn imu(&self) -> &ImuHandle {
        &self.imu
    }

    pub fn drive_motors(&self) -> &PerWheel<DriveMotor> {
        &self.drive
    }

    pub fn drive_motor(&self, wheel: Wheel) -> &DriveMotor {
        &self.drive[wheel]
    }

    /// Module the bulk read targets
    pub fn drive_module(&self) -> u8 {
        self.drive_module
    }

    pub fn intake_motors(&self) -> &[MotorHandle; 2] {
        &self.intake
    }

    pub fn servos(&self) -> &[ServoHandle; 6] {
        &self.servos
    }

    pub fn servo(&self, servo: ServoId) -> &ServoHandle {
        &self.servos[servo.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::DeviceEntry;
    use crate::hub::map::{CONTROL_HUB, EXPANSION_HUB};

    #[test]
    fn test_resolve_default_map() {
        let registry = DeviceRegistry::resolve(&HardwareMap::default()).unwrap();
        assert_eq!(registry.imu().name, IMU_NAME);
        assert_eq!(registry.drive_module(), CONTROL_HUB);
        assert_eq!(registry.intake_motors()[1].name, "intake_right");
        assert_eq!(registry.servo(ServoId::LeftTray).name, "leftTray");
        assert_eq!(registry.servos().len(), 6);
    }

    #[test]
    fn test_drive_motors_in_wheel_order_with_signs() {
        let registry = DeviceRegistry::resolve(&HardwareMap::default()).unwrap();
        let names: Vec<&str> = registry
            .drive_motors()
            .iter()
            .map(|(_, m)| m.handle.name.as_str())
            .collect();
        assert_eq!(names, ["front_left", "rear_left", "rear_right", "front_right"]);
        assert_eq!(
            registry.drive_motor(Wheel::RearRight).direction,
            Direction::Reverse
        );
        assert_eq!(
            registry.drive_motor(Wheel::RearLeft).direction,
            Direction::Forward
        );
    }

    #[test]
    fn test_missing_device_is_fatal() {
        let mut map = HardwareMap::default();
        map.remove("rightTray");
        let err = DeviceRegistry::resolve(&map).unwrap_err();
        assert!(matches!(
            err,
            DriveError::DeviceNotFound { ref name, class: DeviceClass::Servo } if name == "rightTray"
        ));
    }

    #[test]
    fn test_wrong_class_is_fatal() {
        let mut map = HardwareMap::default();
        map.insert("imu", DeviceEntry::new(DeviceClass::Servo, CONTROL_HUB, 0));
        assert!(matches!(
            DeviceRegistry::resolve(&map),
            Err(DriveError::WrongDeviceClass {
                expected: DeviceClass::Imu,
                found: DeviceClass::Servo,
                ..
            })
        ));
    }

    #[test]
    fn test_drive_motors_must_share_a_module() {
        let mut map = HardwareMap::default();
        map.insert(
            "rear_right",
            DeviceEntry::new(DeviceClass::Motor, EXPANSION_HUB, 2),
        );
        assert!(matches!(
            DeviceRegistry::resolve(&map),
            Err(DriveError::DriveMotorsSplit { found: EXPANSION_HUB, .. })
        ));
    }

    #[test]
    fn test_drive_motor_port_out_of_range() {
        let mut map = HardwareMap::default();
        map.insert("front_right", DeviceEntry::new(DeviceClass::Motor, CONTROL_HUB, 4));
        assert!(matches!(
            DeviceRegistry::resolve(&map),
            Err(DriveError::InvalidMotorPort { port: 4, .. })
        ));
    }

    #[test]
    fn test_servo_homes_lookup() {
        let homes = ServoHomes::default();
        assert_eq!(homes.get(ServoId::LeftGrab), 0.4);
        assert_eq!(homes.get(ServoId::RightTray), 1.0);
        assert!(homes.validate().is_ok());
    }

    #[test]
    fn test_servo_home_out_of_range() {
        let homes = ServoHomes {
            right_arm: -0.3,
            ..ServoHomes::default()
        };
        assert!(matches!(
            homes.validate(),
            Err(DriveError::ServoPositionOutOfRange { position }) if position == -0.3
        ));
        // NaN is not a position either
        let homes = ServoHomes {
            left_tray: f64::NAN,
            ..ServoHomes::default()
        };
        assert!(homes.validate().is_err());
    }
}
