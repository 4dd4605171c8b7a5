// Wheel indexing and the per-wheel sign table

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Drive wheels, in the order every per-wheel vector uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    FrontLeft = 0,
    RearLeft = 1,
    RearRight = 2,
    FrontRight = 3,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::RearLeft,
        Wheel::RearRight,
        Wheel::FrontRight,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Hardware map name of the wheel's motor
    pub const fn device_name(self) -> &'static str {
        match self {
            Wheel::FrontLeft => "front_left",
            Wheel::RearLeft => "rear_left",
            Wheel::RearRight => "rear_right",
            Wheel::FrontRight => "front_right",
        }
    }

    /// Mounting direction from the sign table
    pub const fn direction(self) -> Direction {
        DIRECTIONS[self.index()]
    }
}

/// Mounting direction of a motor relative to "forward"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Signed scale factor applied to power going out and ticks coming in
    pub const fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Right side motors are mirrored on the chassis
const DIRECTIONS: [Direction; 4] = [
    Direction::Forward,
    Direction::Forward,
    Direction::Reverse,
    Direction::Reverse,
];

/// One value per wheel, indexed by `Wheel`. Serializes as a 4-element array
/// in wheel order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerWheel<T>(pub [T; 4]);

impl<T> PerWheel<T> {
    pub fn new(front_left: T, rear_left: T, rear_right: T, front_right: T) -> Self {
        Self([front_left, rear_left, rear_right, front_right])
    }

    pub fn from_fn(mut f: impl FnMut(Wheel) -> T) -> Self {
        Self(Wheel::ALL.map(&mut f))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PerWheel<U> {
        PerWheel(self.0.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Wheel, &T)> {
        Wheel::ALL.into_iter().zip(self.0.iter())
    }

    pub fn as_array(&self) -> &[T; 4] {
        &self.0
    }

    pub fn into_array(self) -> [T; 4] {
        self.0
    }
}

impl<T: Copy> PerWheel<T> {
    pub fn splat(value: T) -> Self {
        Self([value; 4])
    }
}

impl<T> Index<Wheel> for PerWheel<T> {
    type Output = T;

    fn index(&self, wheel: Wheel) -> &T {
        &self.0[wheel.index()]
    }
}

impl<T> IndexMut<Wheel> for PerWheel<T> {
    fn index_mut(&mut self, wheel: Wheel) -> &mut T {
        &mut self.0[wheel.index()]
    }
}

impl<T> From<[T; 4]> for PerWheel<T> {
    fn from(values: [T; 4]) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_order_is_fixed() {
        let indices: Vec<usize> = Wheel::ALL.iter().map(|w| w.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(Wheel::ALL[0], Wheel::FrontLeft);
        assert_eq!(Wheel::ALL[3], Wheel::FrontRight);
    }

    #[test]
    fn test_sign_table() {
        assert_eq!(Wheel::FrontLeft.direction(), Direction::Forward);
        assert_eq!(Wheel::RearLeft.direction(), Direction::Forward);
        assert_eq!(Wheel::RearRight.direction(), Direction::Reverse);
        assert_eq!(Wheel::FrontRight.direction(), Direction::Reverse);
        assert_eq!(Direction::Reverse.sign(), -1.0);
    }

    #[test]
    fn test_per_wheel_indexing() {
        let mut values = PerWheel::new(1, 2, 3, 4);
        assert_eq!(values[Wheel::RearRight], 3);
        values[Wheel::FrontRight] = 40;
        assert_eq!(values.into_array(), [1, 2, 3, 40]);
    }

    #[test]
    fn test_per_wheel_from_fn_follows_order() {
        let names = PerWheel::from_fn(Wheel::device_name);
        assert_eq!(
            names.into_array(),
            ["front_left", "rear_left", "rear_right", "front_right"]
        );
    }

    #[test]
    fn test_per_wheel_json_is_array() {
        let json = serde_json::to_string(&PerWheel::new(0.5, -0.5, 1.0, 0.0)).unwrap();
        assert_eq!(json, "[0.5,-0.5,1.0,0.0]");
        let parsed: PerWheel<f64> = serde_json::from_str("[1.0,2.0,3.0,4.0]").unwrap();
        assert_eq!(parsed[Wheel::RearLeft], 2.0);
    }
}
