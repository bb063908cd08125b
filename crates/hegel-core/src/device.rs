//! Catalog of supported Hegel amplifiers and their input names.
//!
//! The session engine never consults this table; it only carries the
//! [`DeviceType`] so that callers can translate between input numbers on the
//! wire and the names printed on the amplifier's front panel.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::types::Input;

/// A supported Hegel amplifier model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Röst.
    Rost,
    /// H95.
    H95,
    /// H120.
    H120,
    /// H190.
    H190,
    /// H190V, the H190 variant with a phono stage.
    H190V,
    /// H390.
    H390,
    /// H590.
    H590,
}

const INPUTS_H95: &[&str] = &[
    "Analog 1",
    "Analog 2",
    "Coaxial",
    "Optical 1",
    "Optical 2",
    "Optical 3",
    "USB",
    "Network",
];

const INPUTS_H120: &[&str] = &[
    "Balanced",
    "Analog 1",
    "Analog 2",
    "Coaxial",
    "Optical 1",
    "Optical 2",
    "Optical 3",
    "USB",
    "Network",
];

const INPUTS_H190V: &[&str] = &[
    "XLR",
    "Analog 1",
    "Analog 2",
    "Coaxial",
    "Optical 1",
    "Optical 2",
    "Optical 3",
    "USB",
    "Network",
    "Phono",
];

const INPUTS_H390: &[&str] = &[
    "XLR",
    "Analog 1",
    "Analog 2",
    "BNC",
    "Coaxial",
    "Optical 1",
    "Optical 2",
    "Optical 3",
    "USB",
    "Network",
];

const INPUTS_H590: &[&str] = &[
    "XLR 1",
    "XLR 2",
    "Analog 1",
    "Analog 2",
    "BNC",
    "Coaxial",
    "Optical 1",
    "Optical 2",
    "Optical 3",
    "USB",
    "Network",
];

impl DeviceType {
    /// Every supported model, in catalog order.
    pub const ALL: [DeviceType; 7] = [
        DeviceType::Rost,
        DeviceType::H95,
        DeviceType::H120,
        DeviceType::H190,
        DeviceType::H190V,
        DeviceType::H390,
        DeviceType::H590,
    ];

    /// Model name as printed on the device.
    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Rost => "Röst",
            DeviceType::H95 => "H95",
            DeviceType::H120 => "H120",
            DeviceType::H190 => "H190",
            DeviceType::H190V => "H190V",
            DeviceType::H390 => "H390",
            DeviceType::H590 => "H590",
        }
    }

    /// Input names in wire order: index 0 is input number 1.
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            DeviceType::H95 => INPUTS_H95,
            // Röst and H190 share the H120 layout.
            DeviceType::Rost | DeviceType::H120 | DeviceType::H190 => INPUTS_H120,
            DeviceType::H190V => INPUTS_H190V,
            DeviceType::H390 => INPUTS_H390,
            DeviceType::H590 => INPUTS_H590,
        }
    }

    /// Number of selectable inputs.
    pub fn input_count(self) -> usize {
        self.inputs().len()
    }

    /// Name of the input with the given 1-based number.
    pub fn input_name(self, input: Input) -> Result<&'static str, Error> {
        if input == 0 {
            return Err(Error::InputIsZero);
        }
        self.inputs()
            .get(usize::from(input) - 1)
            .copied()
            .ok_or(Error::InputOutOfRange {
                input,
                device: self.name(),
                count: self.input_count(),
            })
    }

    /// 1-based number of the input with the given name.
    pub fn input_number(self, name: &str) -> Result<Input, Error> {
        self.inputs()
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(|index| (index + 1) as Input)
            .ok_or_else(|| Error::UnknownInput {
                name: name.to_string(),
                device: self.name(),
            })
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RÖST" | "ROST" => Ok(DeviceType::Rost),
            "H95" => Ok(DeviceType::H95),
            "H120" => Ok(DeviceType::H120),
            "H190" => Ok(DeviceType::H190),
            "H190V" => Ok(DeviceType::H190V),
            "H390" => Ok(DeviceType::H390),
            "H590" => Ok(DeviceType::H590),
            _ => Err(Error::UnsupportedDevice(s.to_string())),
        }
    }
}
