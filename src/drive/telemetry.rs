// Bulk telemetry: one hub round-trip per read for all four drive encoders

use serde::Serialize;
use tracing::debug;

use super::mecanum::MecanumDrive;
use super::registry::DeviceRegistry;
use super::units::WheelGeometry;
use super::wheel::PerWheel;
use crate::hub::{BulkData, Hub};

/// Encoder ticks and tick rates in wheel order, sign-corrected so forward is
/// positive on every wheel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub positions: PerWheel<f64>,
    pub velocities: PerWheel<f64>,
}

impl TelemetrySnapshot {
    pub fn from_bulk(data: &BulkData, registry: &DeviceRegistry) -> Self {
        let motors = registry.drive_motors();
        Self {
            positions: PerWheel::from_fn(|wheel| {
                let motor = &motors[wheel];
                motor.direction.sign() * data.motor_position(&motor.handle) as f64
            }),
            velocities: PerWheel::from_fn(|wheel| {
                let motor = &motors[wheel];
                motor.direction.sign() * data.motor_velocity(&motor.handle) as f64
            }),
        }
    }
}

/// Result of a bulk read. `Stale` means the hub returned nothing this cycle;
/// it converts to all zeros but stays distinguishable from a stationary robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryFrame {
    Fresh(TelemetrySnapshot),
    Stale,
}

impl TelemetryFrame {
    pub fn is_stale(&self) -> bool {
        matches!(self, TelemetryFrame::Stale)
    }

    /// Wheel positions in inches
    pub fn positions(&self, geometry: &WheelGeometry) -> PerWheel<f64> {
        match self {
            TelemetryFrame::Fresh(snapshot) => {
                snapshot.positions.map(|ticks| geometry.ticks_to_inches(ticks))
            }
            TelemetryFrame::Stale => PerWheel::splat(0.0),
        }
    }

    /// Wheel velocities in inches per hub time base
    pub fn velocities(&self, geometry: &WheelGeometry) -> PerWheel<f64> {
        match self {
            TelemetryFrame::Fresh(snapshot) => {
                snapshot.velocities.map(|ticks| geometry.ticks_to_inches(ticks))
            }
            TelemetryFrame::Stale => PerWheel::splat(0.0),
        }
    }
}

/// Positions and velocities from the same bulk read
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WheelState {
    pub positions: PerWheel<f64>,
    pub velocities: PerWheel<f64>,
    pub stale: bool,
}

/// Issue exactly one bulk read. Any transport failure degrades to `Stale`;
/// the next cycle simply reads again.
pub fn read_bulk<H: Hub>(hub: &mut H, registry: &DeviceRegistry) -> TelemetryFrame {
    match hub.bulk_read(registry.drive_module()) {
        Ok(data) => TelemetryFrame::Fresh(TelemetrySnapshot::from_bulk(&data, registry)),
        Err(e) => {
            debug!("Bulk read failed, reporting zero frame: {}", e);
            TelemetryFrame::Stale
        }
    }
}

impl<H: Hub> MecanumDrive<H> {
    /// Raw bulk read, for callers that need to tell a failed read from a
    /// stationary robot
    pub fn read_telemetry(&mut self) -> TelemetryFrame {
        let (hub, registry) = self.hub_and_registry();
        read_bulk(hub, registry)
    }

    /// Wheel positions in inches, wheel order; all zeros if the read failed
    pub fn wheel_positions(&mut self) -> PerWheel<f64> {
        let geometry = self.geometry();
        self.read_telemetry().positions(&geometry)
    }

    /// Wheel velocities in inches per hub time base; all zeros if the read
    /// failed
    pub fn wheel_velocities(&mut self) -> PerWheel<f64> {
        let geometry = self.geometry();
        self.read_telemetry().velocities(&geometry)
    }

    /// Positions and velocities from a single bulk read
    pub fn wheel_state(&mut self) -> WheelState {
        let geometry = self.geometry();
        let frame = self.read_telemetry();
        WheelState {
            positions: frame.positions(&geometry),
            velocities: frame.velocities(&geometry),
            stale: frame.is_stale(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::wheel::Wheel;
    use crate::hub::{HardwareMap, HubCall, SimHub};
    use crate::hub::map::CONTROL_HUB;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::resolve(&HardwareMap::default()).unwrap()
    }

    fn geometry() -> WheelGeometry {
        WheelGeometry {
            ticks_per_rev: 1000.0,
            wheel_radius: 2.0,
            gear_ratio: 1.0,
        }
    }

    #[test]
    fn test_single_bulk_read_per_call() {
        let mut hub = SimHub::new();
        let frame = read_bulk(&mut hub, &registry());
        assert!(!frame.is_stale());
        assert_eq!(hub.calls(), &[HubCall::BulkRead { module: CONTROL_HUB }]);
    }

    #[test]
    fn test_snapshot_corrects_reversed_wheels() {
        let mut hub = SimHub::new();
        hub.set_encoder(CONTROL_HUB, 0, 100, 10);
        hub.set_encoder(CONTROL_HUB, 1, 200, 20);
        hub.set_encoder(CONTROL_HUB, 2, -300, -30);
        hub.set_encoder(CONTROL_HUB, 3, -400, -40);

        let TelemetryFrame::Fresh(snapshot) = read_bulk(&mut hub, &registry()) else {
            panic!("expected a fresh frame");
        };
        assert_eq!(snapshot.positions.into_array(), [100.0, 200.0, 300.0, 400.0]);
        assert_eq!(snapshot.velocities.into_array(), [10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_failed_read_is_stale_zero() {
        let mut hub = SimHub::new();
        hub.set_encoder(CONTROL_HUB, 0, 1000, 5);
        hub.fail_next_bulk_reads(1);

        let frame = read_bulk(&mut hub, &registry());
        assert!(frame.is_stale());
        assert_eq!(frame.positions(&geometry()).into_array(), [0.0; 4]);
        assert_eq!(frame.velocities(&geometry()).into_array(), [0.0; 4]);
    }

    #[test]
    fn test_frame_converts_to_inches() {
        let snapshot = TelemetrySnapshot {
            positions: PerWheel::new(1000.0, -1000.0, 0.0, 500.0),
            velocities: PerWheel::splat(0.0),
        };
        let positions = TelemetryFrame::Fresh(snapshot).positions(&geometry());
        assert!((positions[Wheel::FrontLeft] - 12.566).abs() < 1e-3);
        assert!((positions[Wheel::RearLeft] + 12.566).abs() < 1e-3);
        assert_eq!(positions[Wheel::RearRight], 0.0);
        assert!((positions[Wheel::FrontRight] - 6.283).abs() < 1e-3);
    }
}
