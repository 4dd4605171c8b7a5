// Mecanum drivetrain HAL
//
// Owns the hub and the device registry. Brings the hardware up in a fixed
// order and maps power commands onto the motors. Telemetry, gains and heading
// live in their own modules as further `impl` blocks.

use tracing::{debug, info, warn};

use super::DriveError;
use super::gains::broadcast_gains;
use super::registry::{DeviceRegistry, DriveMotor, ServoId, check_servo_position};
use super::units::WheelGeometry;
use super::wheel::{PerWheel, Wheel};
use crate::config::{DriveConstants, RobotConfig};
use crate::hub::{
    Hub, ImuHandle, ImuParameters, MotorHandle, RunMode, ServoHandle, ZeroPowerBehavior,
};

pub struct MecanumDrive<H: Hub> {
    hub: H,
    registry: DeviceRegistry,
    constants: DriveConstants,
}

impl<H: Hub> MecanumDrive<H> {
    /// Bring up the drivetrain.
    ///
    /// Order: firmware check, resolve every device, IMU (units then axis
    /// remap), drive motors, intake motors, initial gains, servo homes last.
    /// Devices and servo homes are checked before the first write. Any
    /// failure aborts; no drive is returned.
    pub fn new(mut hub: H, config: &RobotConfig) -> Result<Self, DriveError> {
        info!("Initializing mecanum drive");
        hub.ensure_minimum_firmware()?;

        let registry = DeviceRegistry::resolve(&config.hardware)?;
        config.servo_homes.validate()?;
        let constants = config.constants;

        let imu = registry.imu();
        hub.configure_imu(imu, ImuParameters::default())?;
        hub.remap_imu_axes(imu, config.imu_remap.registers())?;
        debug!("IMU {} configured with remap {:?}", imu.name, config.imu_remap);

        for (wheel, motor) in registry.drive_motors().iter() {
            if constants.run_using_encoder {
                hub.set_motor_mode(&motor.handle, RunMode::RunUsingEncoder)?;
            }
            hub.set_zero_power_behavior(&motor.handle, ZeroPowerBehavior::Brake)?;
            debug!("{:?} motor {} ready ({:?})", wheel, motor.handle.name, motor.direction);
        }

        for motor in registry.intake_motors() {
            hub.set_motor_mode(motor, RunMode::RunWithoutEncoder)?;
            hub.set_zero_power_behavior(motor, ZeroPowerBehavior::Brake)?;
        }

        if constants.run_using_encoder {
            if let Some(gains) = constants.motor_velo_pid {
                info!("Applying initial velocity gains {:?}", gains);
                let feedforward = constants.velocity_feedforward(RunMode::RunUsingEncoder);
                broadcast_gains(
                    &mut hub,
                    &registry,
                    RunMode::RunUsingEncoder,
                    gains,
                    feedforward,
                )?;
            }
        }

        for servo in ServoId::ALL {
            hub.set_servo_position(registry.servo(servo), config.servo_homes.get(servo))?;
        }

        info!("Mecanum drive initialized");
        Ok(Self {
            hub,
            registry,
            constants,
        })
    }

    /// Apply one power per wheel, unclamped and unmixed
    pub fn set_wheel_powers(&mut self, powers: PerWheel<f64>) -> Result<(), DriveError> {
        debug!("Setting wheel powers: {:?}", powers.as_array());
        for wheel in Wheel::ALL {
            let motor = self.registry.drive_motor(wheel);
            self.hub
                .set_motor_power(&motor.handle, motor.direction.sign() * powers[wheel])?;
        }
        Ok(())
    }

    /// Apply powers in wheel order: front-left, rear-left, rear-right,
    /// front-right
    pub fn set_motor_powers(
        &mut self,
        front_left: f64,
        rear_left: f64,
        rear_right: f64,
        front_right: f64,
    ) -> Result<(), DriveError> {
        self.set_wheel_powers(PerWheel::new(front_left, rear_left, rear_right, front_right))
    }

    /// Same power to both intake motors
    pub fn set_intake_power(&mut self, power: f64) -> Result<(), DriveError> {
        for motor in self.registry.intake_motors() {
            self.hub.set_motor_power(motor, power)?;
        }
        Ok(())
    }

    /// Zero every wheel and the intake
    pub fn stop(&mut self) -> Result<(), DriveError> {
        info!("Stopping drive and intake");
        self.set_wheel_powers(PerWheel::splat(0.0))?;
        self.set_intake_power(0.0)
    }

    /// Move a servo; positions are normalized to [0, 1]
    pub fn set_servo_position(&mut self, servo: ServoId, position: f64) -> Result<(), DriveError> {
        check_servo_position(position)?;
        self.hub
            .set_servo_position(self.registry.servo(servo), position)?;
        Ok(())
    }

    pub fn drive_motors(&self) -> &PerWheel<DriveMotor> {
        self.registry.drive_motors()
    }

    pub fn intake_motors(&self) -> &[MotorHandle; 2] {
        self.registry.intake_motors()
    }

    pub fn servos(&self) -> &[ServoHandle; 6] {
        self.registry.servos()
    }

    pub fn imu(&self) -> &ImuHandle {
        self.registry.imu()
    }

    pub fn constants(&self) -> &DriveConstants {
        &self.constants
    }

    pub fn geometry(&self) -> WheelGeometry {
        self.constants.geometry()
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut H {
        &mut self.hub
    }

    pub(crate) fn hub_and_registry(&mut self) -> (&mut H, &DeviceRegistry) {
        (&mut self.hub, &self.registry)
    }
}

impl<H: Hub> Drop for MecanumDrive<H> {
    fn drop(&mut self) {
        // Leave the motors unpowered when the drive goes away
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
