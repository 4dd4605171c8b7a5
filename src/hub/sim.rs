// Simulated hub
//
// Keeps motor/servo/IMU state in memory and records every call in order, so
// tests can assert on exactly what reached the hardware. With physics enabled
// each bulk read integrates encoder ticks from the commanded power, which is
// enough for `--sim` runs of the runtime loop.

use std::collections::BTreeMap;

use tracing::debug;

use super::{
    AxisRemap, BulkData, FirmwareVersion, Hub, HubError, ImuHandle, ImuParameters, MIN_FIRMWARE,
    MOTOR_PORTS, MotorHandle, Orientation, PidfCoefficients, Result, RunMode, ServoHandle,
    ZeroPowerBehavior,
};
use super::map::{CONTROL_HUB, EXPANSION_HUB};

/// One call as seen by the hub
#[derive(Debug, Clone, PartialEq)]
pub enum HubCall {
    FirmwareCheck,
    BulkRead { module: u8 },
    SetMotorPower { motor: String, power: f64 },
    SetMotorMode { motor: String, mode: RunMode },
    SetZeroPowerBehavior { motor: String, behavior: ZeroPowerBehavior },
    SetPidf { motor: String, mode: RunMode, coefficients: PidfCoefficients },
    GetPidf { motor: String, mode: RunMode },
    SetServoPosition { servo: String, position: f64 },
    ConfigureImu { imu: String, params: ImuParameters },
    RemapImuAxes { imu: String, remap: AxisRemap },
    ReadOrientation { imu: String },
}

/// State of one simulated motor port
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimMotor {
    pub power: f64,
    pub mode: RunMode,
    pub zero_power: ZeroPowerBehavior,
    /// Indexed by `RunMode as usize`
    pub pidf: [PidfCoefficients; 2],
    pub position: f64,
    pub velocity: f64,
}

impl Default for SimMotor {
    fn default() -> Self {
        Self {
            power: 0.0,
            mode: RunMode::RunWithoutEncoder,
            zero_power: ZeroPowerBehavior::Float,
            pidf: [PidfCoefficients::default(); 2],
            position: 0.0,
            velocity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Physics {
    /// Encoder rate at full power
    ticks_per_second: f64,
    /// Time advanced per bulk read
    step_seconds: f64,
}

pub struct SimHub {
    /// Module addresses the sim stands in for
    modules: Vec<u8>,
    firmware: FirmwareVersion,
    motors: BTreeMap<(u8, u8), SimMotor>,
    servos: BTreeMap<(u8, u8), f64>,
    orientation: Orientation,
    imu_params: Option<ImuParameters>,
    imu_remap: Option<AxisRemap>,
    physics: Option<Physics>,
    failed_bulk_reads: usize,
    failing_pidf_motors: Vec<String>,
    calls: Vec<HubCall>,
}

impl SimHub {
    pub fn new() -> Self {
        Self {
            modules: vec![CONTROL_HUB, EXPANSION_HUB],
            firmware: MIN_FIRMWARE,
            motors: BTreeMap::new(),
            servos: BTreeMap::new(),
            orientation: Orientation::default(),
            imu_params: None,
            imu_remap: None,
            physics: None,
            failed_bulk_reads: 0,
            failing_pidf_motors: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Answer for these module addresses instead of the default pair
    pub fn with_modules(mut self, modules: &[u8]) -> Self {
        self.modules = modules.to_vec();
        self
    }

    /// Report this firmware version from every module
    pub fn with_firmware(mut self, firmware: FirmwareVersion) -> Self {
        self.firmware = firmware;
        self
    }

    /// Integrate encoder ticks from power on every bulk read
    pub fn with_physics(mut self, ticks_per_second: f64, step_seconds: f64) -> Self {
        self.physics = Some(Physics {
            ticks_per_second,
            step_seconds,
        });
        self
    }

    /// The next `count` bulk reads report no data
    pub fn fail_next_bulk_reads(&mut self, count: usize) {
        self.failed_bulk_reads = count;
    }

    /// PIDF writes to `motor` time out from now on
    pub fn fail_pidf_writes_to(&mut self, motor: &str) {
        self.failing_pidf_motors.push(motor.to_string());
    }

    pub fn set_encoder(&mut self, module: u8, port: u8, position: i32, velocity: i32) {
        let motor = self.motors.entry((module, port)).or_default();
        motor.position = position as f64;
        motor.velocity = velocity as f64;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn motor(&self, module: u8, port: u8) -> Option<&SimMotor> {
        self.motors.get(&(module, port))
    }

    pub fn servo_position(&self, module: u8, port: u8) -> Option<f64> {
        self.servos.get(&(module, port)).copied()
    }

    pub fn imu_params(&self) -> Option<ImuParameters> {
        self.imu_params
    }

    pub fn imu_remap(&self) -> Option<AxisRemap> {
        self.imu_remap
    }

    pub fn calls(&self) -> &[HubCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Last power commanded to the named motor
    pub fn last_power(&self, motor: &str) -> Option<f64> {
        self.calls.iter().rev().find_map(|call| match call {
            HubCall::SetMotorPower { motor: name, power } if name == motor => Some(*power),
            _ => None,
        })
    }

    fn motor_mut(&mut self, motor: &MotorHandle) -> &mut SimMotor {
        self.motors.entry((motor.module, motor.port)).or_default()
    }

    fn step_physics(&mut self, module: u8) {
        let Some(physics) = self.physics else {
            return;
        };
        for (_, motor) in self.motors.range_mut((module, 0)..(module, MOTOR_PORTS as u8)) {
            motor.velocity = motor.power * physics.ticks_per_second;
            motor.position += motor.velocity * physics.step_seconds;
        }
    }
}

impl Default for SimHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub for SimHub {
    fn ensure_minimum_firmware(&mut self) -> Result<()> {
        self.calls.push(HubCall::FirmwareCheck);
        match self.modules.first() {
            Some(&module) if self.firmware < MIN_FIRMWARE => Err(HubError::FirmwareTooOld {
                module,
                found: self.firmware,
                required: MIN_FIRMWARE,
            }),
            _ => Ok(()),
        }
    }

    fn bulk_read(&mut self, module: u8) -> Result<BulkData> {
        self.calls.push(HubCall::BulkRead { module });
        if self.failed_bulk_reads > 0 {
            self.failed_bulk_reads -= 1;
            return Err(HubError::NoBulkData { module });
        }

        self.step_physics(module);

        let mut data = BulkData {
            module,
            ..BulkData::default()
        };
        for port in 0..MOTOR_PORTS {
            if let Some(motor) = self.motors.get(&(module, port as u8)) {
                data.positions[port] = motor.position.round() as i32;
                data.velocities[port] = motor.velocity.round() as i32;
            }
        }
        debug!("Sim bulk read on module {}: {:?}", module, data.positions);
        Ok(data)
    }

    fn set_motor_power(&mut self, motor: &MotorHandle, power: f64) -> Result<()> {
        self.calls.push(HubCall::SetMotorPower {
            motor: motor.name.clone(),
            power,
        });
        self.motor_mut(motor).power = power;
        Ok(())
    }

    fn set_motor_mode(&mut self, motor: &MotorHandle, mode: RunMode) -> Result<()> {
        self.calls.push(HubCall::SetMotorMode {
            motor: motor.name.clone(),
            mode,
        });
        self.motor_mut(motor).mode = mode;
        Ok(())
    }

    fn set_zero_power_behavior(
        &mut self,
        motor: &MotorHandle,
        behavior: ZeroPowerBehavior,
    ) -> Result<()> {
        self.calls.push(HubCall::SetZeroPowerBehavior {
            motor: motor.name.clone(),
            behavior,
        });
        self.motor_mut(motor).zero_power = behavior;
        Ok(())
    }

    fn set_pidf(
        &mut self,
        motor: &MotorHandle,
        mode: RunMode,
        coefficients: PidfCoefficients,
    ) -> Result<()> {
        self.calls.push(HubCall::SetPidf {
            motor: motor.name.clone(),
            mode,
            coefficients,
        });
        if self.failing_pidf_motors.contains(&motor.name) {
            return Err(HubError::Timeout {
                module: motor.module,
            });
        }
        self.motor_mut(motor).pidf[mode as usize] = coefficients;
        Ok(())
    }

    fn pidf(&mut self, motor: &MotorHandle, mode: RunMode) -> Result<PidfCoefficients> {
        self.calls.push(HubCall::GetPidf {
            motor: motor.name.clone(),
            mode,
        });
        Ok(self.motor_mut(motor).pidf[mode as usize])
    }

    fn set_servo_position(&mut self, servo: &ServoHandle, position: f64) -> Result<()> {
        self.calls.push(HubCall::SetServoPosition {
            servo: servo.name.clone(),
            position,
        });
        self.servos.insert((servo.module, servo.port), position);
        Ok(())
    }

    fn configure_imu(&mut self, imu: &ImuHandle, params: ImuParameters) -> Result<()> {
        self.calls.push(HubCall::ConfigureImu {
            imu: imu.name.clone(),
            params,
        });
        self.imu_params = Some(params);
        Ok(())
    }

    fn remap_imu_axes(&mut self, imu: &ImuHandle, remap: AxisRemap) -> Result<()> {
        self.calls.push(HubCall::RemapImuAxes {
            imu: imu.name.clone(),
            remap,
        });
        self.imu_remap = Some(remap);
        Ok(())
    }

    fn angular_orientation(&mut self, imu: &ImuHandle) -> Result<Orientation> {
        self.calls.push(HubCall::ReadOrientation {
            imu: imu.name.clone(),
        });
        Ok(self.orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor(port: u8) -> MotorHandle {
        MotorHandle {
            name: format!("m{}", port),
            module: 2,
            port,
        }
    }

    #[test]
    fn test_firmware_check() {
        let mut hub = SimHub::new();
        assert!(hub.ensure_minimum_firmware().is_ok());

        let mut old = SimHub::new().with_firmware(FirmwareVersion::new(1, 7, 0));
        assert!(matches!(
            old.ensure_minimum_firmware(),
            Err(HubError::FirmwareTooOld { module: CONTROL_HUB, .. })
        ));

        let mut expansion_only = SimHub::new()
            .with_modules(&[EXPANSION_HUB])
            .with_firmware(FirmwareVersion::new(1, 8, 1));
        assert!(matches!(
            expansion_only.ensure_minimum_firmware(),
            Err(HubError::FirmwareTooOld { module: EXPANSION_HUB, .. })
        ));
    }

    #[test]
    fn test_scripted_bulk_failures() {
        let mut hub = SimHub::new();
        hub.set_encoder(2, 1, 42, -7);
        hub.fail_next_bulk_reads(1);

        assert!(matches!(
            hub.bulk_read(2),
            Err(HubError::NoBulkData { module: 2 })
        ));
        let data = hub.bulk_read(2).unwrap();
        assert_eq!(data.positions, [0, 42, 0, 0]);
        assert_eq!(data.velocities, [0, -7, 0, 0]);
    }

    #[test]
    fn test_physics_integrates_power() {
        let mut hub = SimHub::new().with_physics(1000.0, 0.1);
        hub.set_motor_power(&motor(0), 0.5).unwrap();
        hub.set_motor_power(&motor(3), -1.0).unwrap();

        let first = hub.bulk_read(2).unwrap();
        assert_eq!(first.velocities, [500, 0, 0, -1000]);
        assert_eq!(first.positions, [50, 0, 0, -100]);

        let second = hub.bulk_read(2).unwrap();
        assert_eq!(second.positions, [100, 0, 0, -200]);
    }

    #[test]
    fn test_physics_stays_on_its_module() {
        let mut hub = SimHub::new().with_physics(1000.0, 0.1);
        let other = MotorHandle {
            name: "intake".to_string(),
            module: 3,
            port: 0,
        };
        hub.set_motor_power(&other, 1.0).unwrap();
        hub.bulk_read(2).unwrap();
        assert_eq!(hub.motor(3, 0).unwrap().position, 0.0);
    }

    #[test]
    fn test_pidf_write_failure() {
        let mut hub = SimHub::new();
        hub.fail_pidf_writes_to("m1");
        let gains = PidfCoefficients {
            p: 1.0,
            ..PidfCoefficients::default()
        };

        assert!(hub.set_pidf(&motor(0), RunMode::RunUsingEncoder, gains).is_ok());
        assert!(hub.set_pidf(&motor(1), RunMode::RunUsingEncoder, gains).is_err());
        assert_eq!(
            hub.pidf(&motor(1), RunMode::RunUsingEncoder).unwrap(),
            PidfCoefficients::default()
        );
    }

    #[test]
    fn test_last_power() {
        let mut hub = SimHub::new();
        hub.set_motor_power(&motor(0), 0.2).unwrap();
        hub.set_motor_power(&motor(0), 0.3).unwrap();
        assert_eq!(hub.last_power("m0"), Some(0.3));
        assert_eq!(hub.last_power("m1"), None);
    }
}
