// Heading from the IMU

use super::DriveError;
use super::mecanum::MecanumDrive;
use crate::hub::Hub;

impl<H: Hub> MecanumDrive<H> {
    /// Heading in radians: the IMU's first angle, passed through as-is. No
    /// unwrapping or filtering; correctness depends on the axis remap done
    /// at init.
    pub fn heading(&mut self) -> Result<f64, DriveError> {
        let (hub, registry) = self.hub_and_registry();
        let orientation = hub.angular_orientation(registry.imu())?;
        Ok(orientation.first_angle)
    }
}
