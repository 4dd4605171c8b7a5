// Closed-loop velocity gains, kept identical on all four drive motors

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::DriveError;
use super::mecanum::MecanumDrive;
use super::registry::DeviceRegistry;
use super::wheel::Wheel;
use crate::hub::{Hub, PidfCoefficients, RunMode};

/// Velocity PID gains. The feed-forward term is derived from the drive
/// calibration on every write and is not part of this value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl VelocityGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    fn with_feedforward(self, f: f64) -> PidfCoefficients {
        PidfCoefficients {
            p: self.kp,
            i: self.ki,
            d: self.kd,
            f,
        }
    }
}

impl From<PidfCoefficients> for VelocityGains {
    fn from(c: PidfCoefficients) -> Self {
        Self::new(c.p, c.i, c.d)
    }
}

/// Write `gains` to every drive motor in wheel order.
///
/// Not atomic: if a write fails the wheels before it keep the new gains and
/// the rest keep the old ones. The split is logged and the hub error
/// returned.
pub(crate) fn broadcast_gains<H: Hub>(
    hub: &mut H,
    registry: &DeviceRegistry,
    mode: RunMode,
    gains: VelocityGains,
    feedforward: f64,
) -> Result<(), DriveError> {
    let coefficients = gains.with_feedforward(feedforward);
    for (n, wheel) in Wheel::ALL.into_iter().enumerate() {
        let motor = &registry.drive_motor(wheel).handle;
        if let Err(e) = hub.set_pidf(motor, mode, coefficients) {
            warn!(
                "Gain write to {} failed, {:?} already hold {:?}: {}",
                motor.name,
                &Wheel::ALL[..n],
                gains,
                e
            );
            return Err(e.into());
        }
    }
    Ok(())
}

impl<H: Hub> MecanumDrive<H> {
    /// Current velocity gains, read from the front-left motor only
    pub fn velocity_gains(&mut self) -> Result<VelocityGains, DriveError> {
        let (hub, registry) = self.hub_and_registry();
        let motor = &registry.drive_motor(Wheel::FrontLeft).handle;
        Ok(hub.pidf(motor, RunMode::RunUsingEncoder)?.into())
    }

    /// Write velocity gains to all four drive motors
    pub fn set_velocity_gains(&mut self, gains: VelocityGains) -> Result<(), DriveError> {
        let feedforward = self
            .constants()
            .velocity_feedforward(RunMode::RunUsingEncoder);
        info!("Setting velocity gains {:?} (f = {:.4})", gains, feedforward);
        let (hub, registry) = self.hub_and_registry();
        broadcast_gains(hub, registry, RunMode::RunUsingEncoder, gains, feedforward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{HardwareMap, HubCall, HubError, SimHub};

    fn registry() -> DeviceRegistry {
        DeviceRegistry::resolve(&HardwareMap::default()).unwrap()
    }

    #[test]
    fn test_broadcast_reaches_every_wheel_in_order() {
        let mut hub = SimHub::new();
        let gains = VelocityGains::new(5.0, 0.1, 0.0);
        broadcast_gains(&mut hub, &registry(), RunMode::RunUsingEncoder, gains, 11.0).unwrap();

        let written: Vec<&str> = hub
            .calls()
            .iter()
            .filter_map(|call| match call {
                HubCall::SetPidf {
                    motor,
                    coefficients,
                    ..
                } => {
                    assert_eq!(VelocityGains::from(*coefficients), gains);
                    assert_eq!(coefficients.f, 11.0);
                    Some(motor.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(written, ["front_left", "rear_left", "rear_right", "front_right"]);
    }

    #[test]
    fn test_partial_broadcast_keeps_earlier_writes() {
        let mut hub = SimHub::new();
        hub.fail_pidf_writes_to("rear_right");
        let registry = registry();
        let gains = VelocityGains::new(5.0, 0.1, 0.0);

        let err = broadcast_gains(&mut hub, &registry, RunMode::RunUsingEncoder, gains, 0.0)
            .unwrap_err();
        assert!(matches!(err, DriveError::Hub(HubError::Timeout { .. })));

        let mode = RunMode::RunUsingEncoder;
        let rear_left = &registry.drive_motor(Wheel::RearLeft).handle;
        let front_right = &registry.drive_motor(Wheel::FrontRight).handle;
        assert_eq!(VelocityGains::from(hub.pidf(rear_left, mode).unwrap()), gains);
        assert_eq!(
            VelocityGains::from(hub.pidf(front_right, mode).unwrap()),
            VelocityGains::default()
        );
    }

    #[test]
    fn test_gains_from_json() {
        let gains: VelocityGains =
            serde_json::from_str(r#"{ "kp": 5.0, "ki": 0.1, "kd": 0.0 }"#).unwrap();
        assert_eq!(gains, VelocityGains::new(5.0, 0.1, 0.0));
    }
}
