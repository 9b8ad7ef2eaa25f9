// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-related types for mesh devices.
//!
//! A device's electrical supply is classified once, at initialization, into
//! a [`PowerProfile`]. The profile never changes for the lifetime of a
//! device session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Battery chemistry (or cell format) of a battery-powered device.
///
/// # Examples
///
/// ```
/// use meshdp_lib::types::BatteryChemistry;
///
/// assert_eq!(BatteryChemistry::Cr2032.as_str(), "CR2032");
/// assert_eq!("aaa".parse::<BatteryChemistry>().unwrap(), BatteryChemistry::Aaa);
/// assert!(BatteryChemistry::Cr2450.is_coin_cell());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatteryChemistry {
    /// 3V lithium coin cell, 220 mAh.
    #[serde(rename = "CR2032")]
    Cr2032,
    /// 3V lithium coin cell, 620 mAh.
    #[serde(rename = "CR2450")]
    Cr2450,
    /// 1.5V alkaline AAA cell.
    #[serde(rename = "AAA")]
    Aaa,
    /// 1.5V alkaline AA cell.
    #[serde(rename = "AA")]
    Aa,
    /// Battery powered, chemistry not known.
    #[serde(rename = "unknown")]
    Unknown,
}

impl BatteryChemistry {
    /// Returns the conventional label of the chemistry.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cr2032 => "CR2032",
            Self::Cr2450 => "CR2450",
            Self::Aaa => "AAA",
            Self::Aa => "AA",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for 3V lithium coin cells.
    #[must_use]
    pub const fn is_coin_cell(&self) -> bool {
        matches!(self, Self::Cr2032 | Self::Cr2450)
    }

    /// Returns true for 1.5V alkaline cells.
    #[must_use]
    pub const fn is_alkaline(&self) -> bool {
        matches!(self, Self::Aaa | Self::Aa)
    }
}

impl fmt::Display for BatteryChemistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryChemistry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CR2032" => Ok(Self::Cr2032),
            "CR2450" => Ok(Self::Cr2450),
            "AAA" => Ok(Self::Aaa),
            "AA" => Ok(Self::Aa),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(format!("unknown battery chemistry: {s}")),
        }
    }
}

/// Electrical supply of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    /// AC mains (single or three phase, including emergency mains).
    Mains,
    /// Low-voltage DC supply.
    LowVoltageDc,
    /// Primary battery of the given chemistry.
    Battery(BatteryChemistry),
}

impl fmt::Display for PowerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mains => f.write_str("mains"),
            Self::LowVoltageDc => f.write_str("dc"),
            Self::Battery(chem) => write!(f, "battery ({chem})"),
        }
    }
}

/// The power classification of a device, fixed for its lifetime.
///
/// # Examples
///
/// ```
/// use meshdp_lib::types::{BatteryChemistry, PowerProfile};
///
/// let coin = PowerProfile::battery(BatteryChemistry::Cr2032);
/// assert!(coin.is_battery());
/// assert_eq!(coin.chemistry(), Some(BatteryChemistry::Cr2032));
///
/// let mains = PowerProfile::mains();
/// assert!(!mains.is_battery());
/// assert_eq!(mains.chemistry(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PowerProfile {
    source: PowerSource,
}

impl PowerProfile {
    /// Creates a profile from a power source.
    #[must_use]
    pub const fn new(source: PowerSource) -> Self {
        Self { source }
    }

    /// Creates a mains profile.
    #[must_use]
    pub const fn mains() -> Self {
        Self::new(PowerSource::Mains)
    }

    /// Creates a low-voltage DC profile.
    #[must_use]
    pub const fn dc() -> Self {
        Self::new(PowerSource::LowVoltageDc)
    }

    /// Creates a battery profile.
    #[must_use]
    pub const fn battery(chemistry: BatteryChemistry) -> Self {
        Self::new(PowerSource::Battery(chemistry))
    }

    /// Returns the power source.
    #[must_use]
    pub const fn source(&self) -> PowerSource {
        self.source
    }

    /// Returns the battery chemistry, if battery powered.
    #[must_use]
    pub const fn chemistry(&self) -> Option<BatteryChemistry> {
        match self.source {
            PowerSource::Battery(chem) => Some(chem),
            PowerSource::Mains | PowerSource::LowVoltageDc => None,
        }
    }

    /// Returns true if the device runs on a battery.
    #[must_use]
    pub const fn is_battery(&self) -> bool {
        matches!(self.source, PowerSource::Battery(_))
    }
}

impl fmt::Display for PowerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}
