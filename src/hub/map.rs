// Hardware map: device name -> (class, module, port)
//
// Stands in for the robot controller's device registry. Lookups are by the
// configured name; the drive layer turns a miss into `DeviceNotFound`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DeviceClass, ImuHandle, MotorHandle, ServoHandle};

/// Default module address of the hub the drive motors and IMU live on
pub const CONTROL_HUB: u8 = 2;
/// Default module address of the secondary hub
pub const EXPANSION_HUB: u8 = 3;

/// One configured device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub class: DeviceClass,
    pub module: u8,
    pub port: u8,
}

impl DeviceEntry {
    pub fn new(class: DeviceClass, module: u8, port: u8) -> Self {
        Self {
            class,
            module,
            port,
        }
    }
}

/// Outcome of a failed lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    NotFound,
    WrongClass(DeviceClass),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareMap {
    devices: BTreeMap<String, DeviceEntry>,
}

impl HardwareMap {
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }

    /// Register (or replace) a device
    pub fn insert(&mut self, name: impl Into<String>, entry: DeviceEntry) -> &mut Self {
        self.devices.insert(name.into(), entry);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<DeviceEntry> {
        self.devices.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&DeviceEntry> {
        self.devices.get(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Distinct module addresses, ascending
    pub fn modules(&self) -> Vec<u8> {
        let mut modules: Vec<u8> = self.devices.values().map(|entry| entry.module).collect();
        modules.sort_unstable();
        modules.dedup();
        modules
    }

    fn lookup(&self, name: &str, class: DeviceClass) -> Result<DeviceEntry, LookupError> {
        let entry = self.devices.get(name).ok_or(LookupError::NotFound)?;
        if entry.class != class {
            return Err(LookupError::WrongClass(entry.class));
        }
        Ok(*entry)
    }

    pub fn resolve_motor(&self, name: &str) -> Result<MotorHandle, LookupError> {
        let entry = self.lookup(name, DeviceClass::Motor)?;
        Ok(MotorHandle {
            name: name.to_string(),
            module: entry.module,
            port: entry.port,
        })
    }

    pub fn resolve_servo(&self, name: &str) -> Result<ServoHandle, LookupError> {
        let entry = self.lookup(name, DeviceClass::Servo)?;
        Ok(ServoHandle {
            name: name.to_string(),
            module: entry.module,
            port: entry.port,
        })
    }

    pub fn resolve_imu(&self, name: &str) -> Result<ImuHandle, LookupError> {
        let entry = self.lookup(name, DeviceClass::Imu)?;
        Ok(ImuHandle {
            name: name.to_string(),
            module: entry.module,
            port: entry.port,
        })
    }
}

impl Default for HardwareMap {
    /// Wiring of the competition robot: drive motors and IMU on the control
    /// hub, intake and servos on the expansion hub
    fn default() -> Self {
        use DeviceClass::{Imu, Motor, Servo};

        let mut map = Self::new();
        map.insert("imu", DeviceEntry::new(Imu, CONTROL_HUB, 0))
            .insert("front_left", DeviceEntry::new(Motor, CONTROL_HUB, 0))
            .insert("rear_left", DeviceEntry::new(Motor, CONTROL_HUB, 1))
            .insert("rear_right", DeviceEntry::new(Motor, CONTROL_HUB, 2))
            .insert("front_right", DeviceEntry::new(Motor, CONTROL_HUB, 3))
            .insert("intake_left", DeviceEntry::new(Motor, EXPANSION_HUB, 0))
            .insert("intake_right", DeviceEntry::new(Motor, EXPANSION_HUB, 1))
            .insert("leftGrab", DeviceEntry::new(Servo, EXPANSION_HUB, 0))
            .insert("rightGrab", DeviceEntry::new(Servo, EXPANSION_HUB, 1))
            .insert("leftArm", DeviceEntry::new(Servo, EXPANSION_HUB, 2))
            .insert("rightArm", DeviceEntry::new(Servo, EXPANSION_HUB, 3))
            .insert("leftTray", DeviceEntry::new(Servo, EXPANSION_HUB, 4))
            .insert("rightTray", DeviceEntry::new(Servo, EXPANSION_HUB, 5));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_has_every_device() {
        let map = HardwareMap::default();
        assert_eq!(map.len(), 13);
        assert!(map.resolve_imu("imu").is_ok());
        assert!(map.resolve_motor("front_right").is_ok());
        assert!(map.resolve_servo("rightTray").is_ok());
    }

    #[test]
    fn test_resolve_missing_name() {
        let map = HardwareMap::default();
        assert_eq!(
            map.resolve_motor("middle_wheel"),
            Err(LookupError::NotFound)
        );
    }

    #[test]
    fn test_resolve_wrong_class() {
        let map = HardwareMap::default();
        assert_eq!(
            map.resolve_motor("leftGrab"),
            Err(LookupError::WrongClass(DeviceClass::Servo))
        );
    }

    #[test]
    fn test_resolved_handle_carries_module_and_port() {
        let map = HardwareMap::default();
        let motor = map.resolve_motor("rear_right").unwrap();
        assert_eq!(motor.name, "rear_right");
        assert_eq!(motor.module, CONTROL_HUB);
        assert_eq!(motor.port, 2);
    }

    #[test]
    fn test_map_from_json() {
        let json = r#"{
            "imu": { "class": "imu", "module": 1, "port": 0 },
            "front_left": { "class": "motor", "module": 1, "port": 3 }
        }"#;
        let map: HardwareMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("front_left"),
            Some(&DeviceEntry::new(DeviceClass::Motor, 1, 3))
        );
    }
}
