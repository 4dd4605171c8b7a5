// Encoder tick -> linear distance conversion

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Calibration needed to turn encoder ticks into inches of wheel travel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelGeometry {
    /// Encoder ticks per motor output shaft revolution
    pub ticks_per_rev: f64,
    /// Wheel radius in inches
    pub wheel_radius: f64,
    /// Output (wheel) speed / input (motor) speed
    pub gear_ratio: f64,
}

impl WheelGeometry {
    pub fn circumference(&self) -> f64 {
        2.0 * PI * self.wheel_radius
    }

    /// Convert ticks to inches. Works the same for tick rates, giving
    /// inches per the hub's velocity time base.
    pub fn ticks_to_inches(&self, ticks: f64) -> f64 {
        ticks / self.ticks_per_rev * self.circumference() * self.gear_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(ticks_per_rev: f64, wheel_radius: f64, gear_ratio: f64) -> WheelGeometry {
        WheelGeometry {
            ticks_per_rev,
            wheel_radius,
            gear_ratio,
        }
    }

    #[test]
    fn test_zero_ticks() {
        assert_eq!(geometry(383.6, 2.0, 1.0).ticks_to_inches(0.0), 0.0);
    }

    #[test]
    fn test_one_revolution_is_circumference() {
        let inches = geometry(1000.0, 2.0, 1.0).ticks_to_inches(1000.0);
        assert!((inches - 12.566).abs() < 1e-3, "got {}", inches);
        assert_eq!(inches, 4.0 * PI);
    }

    #[test]
    fn test_negative_ticks_map_to_negative_distance() {
        let g = geometry(383.6, 2.0, 1.0);
        assert_eq!(g.ticks_to_inches(-500.0), -g.ticks_to_inches(500.0));
        assert!(g.ticks_to_inches(-1.0) < 0.0);
    }

    #[test]
    fn test_formula_matches_definition() {
        let g = geometry(537.7, 1.8898, 0.75);
        for ticks in [-100_000.0, -1.0, 1.0, 12_345.0, 1e9] {
            let expected = ticks / 537.7 * (2.0 * PI * 1.8898) * 0.75;
            assert_eq!(g.ticks_to_inches(ticks), expected);
        }
    }

    #[test]
    fn test_gear_ratio_scales_distance() {
        let direct = geometry(1000.0, 2.0, 1.0).ticks_to_inches(1000.0);
        let geared = geometry(1000.0, 2.0, 0.5).ticks_to_inches(1000.0);
        assert!((geared - direct / 2.0).abs() < 1e-12);
    }
}
