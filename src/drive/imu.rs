// IMU axis remap
//
// The hub is mounted on its side, so the IMU's native axes don't line up with
// the chassis. The remap is written once at init; headings are read as-is
// afterwards.

use serde::{Deserialize, Serialize};

use crate::hub::AxisRemap;

/// Which physical axis each remapped axis reads from
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxesOrder {
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl AxesOrder {
    /// Physical axis index (x=0, y=1, z=2) for remapped x, y, z
    pub const fn indices(self) -> [u8; 3] {
        match self {
            AxesOrder::XYZ => [0, 1, 2],
            AxesOrder::XZY => [0, 2, 1],
            AxesOrder::YXZ => [1, 0, 2],
            AxesOrder::YZX => [1, 2, 0],
            AxesOrder::ZXY => [2, 0, 1],
            AxesOrder::ZYX => [2, 1, 0],
        }
    }
}

/// Sign of each remapped axis (P = positive, N = negative), x first
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxesSigns {
    PPP = 0b000,
    PPN = 0b001,
    PNP = 0b010,
    PNN = 0b011,
    NPP = 0b100,
    NPN = 0b101,
    NNP = 0b110,
    NNN = 0b111,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisRemapConfig {
    pub order: AxesOrder,
    pub signs: AxesSigns,
}

impl Default for AxisRemapConfig {
    fn default() -> Self {
        Self {
            order: AxesOrder::XYZ,
            signs: AxesSigns::NPN,
        }
    }
}

impl AxisRemapConfig {
    /// Register values: AXIS_MAP_CONFIG packs x/y/z source indices into
    /// bits [1:0], [3:2], [5:4]; AXIS_MAP_SIGN has x in bit 2, z in bit 0
    pub fn registers(&self) -> AxisRemap {
        let [x, y, z] = self.order.indices();
        AxisRemap {
            config: (z << 4) | (y << 2) | x,
            signs: self.signs as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_order_is_chip_default() {
        let remap = AxisRemapConfig {
            order: AxesOrder::XYZ,
            signs: AxesSigns::PPP,
        }
        .registers();
        assert_eq!(remap.config, 0x24);
        assert_eq!(remap.signs, 0x00);
    }

    #[test]
    fn test_default_remap() {
        let remap = AxisRemapConfig::default().registers();
        assert_eq!(remap.config, 0x24);
        assert_eq!(remap.signs, 0b101);
    }

    #[test]
    fn test_swapped_axes() {
        // x <- y, y <- x, z <- z
        let remap = AxisRemapConfig {
            order: AxesOrder::YXZ,
            signs: AxesSigns::PPN,
        }
        .registers();
        assert_eq!(remap.config, 0b10_00_01);
        assert_eq!(remap.signs, 0b001);
    }

    #[test]
    fn test_config_from_json() {
        let config: AxisRemapConfig =
            serde_json::from_str(r#"{ "order": "ZYX", "signs": "NNN" }"#).unwrap();
        assert_eq!(config.order, AxesOrder::ZYX);
        assert_eq!(config.registers().config, 0b00_01_10);
        assert_eq!(config.registers().signs, 0b111);
    }
}
