// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-source detection.
//!
//! A device is classified once, at its first interview, from the basic
//! cluster's `powerSource` attribute and the presence of a power
//! configuration (battery) cluster. The resulting [`PowerProfile`] is fixed
//! for the lifetime of the device session.
//!
//! # Decision Order
//!
//! 1. A `powerSource` of mains (`0x01`, `0x02`, `0x05`, `0x06`) or DC
//!    (`0x04`) wins.
//! 2. Otherwise a power configuration cluster means battery. The chemistry
//!    comes from the rated voltage: above 2.7V is a coin cell, at or below
//!    1.6V an alkaline cell, anything between is unknown.
//! 3. Otherwise the device is treated as mains powered.
//!
//! Battery levels reported later through the power configuration cluster
//! are read with [`PowerConfigReport`], against the detected chemistry.

mod battery;

pub use battery::battery_percentage_from_zcl;

use crate::types::{BatteryChemistry, PowerProfile};

/// Bit 7 of `powerSource` flags a secondary battery backup.
const SECONDARY_BATTERY_FLAG: u8 = 0x80;

/// Lowest rated voltage read as a 3V lithium coin cell (exclusive).
const COIN_CELL_MIN_VOLTS: f32 = 2.7;

/// Highest rated voltage read as a 1.5V alkaline cell (inclusive).
const ALKALINE_MAX_VOLTS: f32 = 1.6;

/// ZCL `BatterySize` values.
const BATTERY_SIZE_AA: u8 = 3;
const BATTERY_SIZE_AAA: u8 = 4;

/// Interview attributes used for power detection.
///
/// # Examples
///
/// ```
/// use meshdp_lib::power::BasicAttributes;
///
/// let attrs = BasicAttributes::new()
///     .with_power_source(0x03)
///     .with_zcl_rated_voltage(30);
/// assert_eq!(attrs.power_source, Some(0x03));
/// assert_eq!(attrs.battery_rated_voltage, Some(3.0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicAttributes {
    /// Basic cluster `powerSource` (0x0007), raw.
    pub power_source: Option<u8>,
    /// Power configuration `BatteryRatedVoltage`, in volts.
    pub battery_rated_voltage: Option<f32>,
    /// Power configuration `BatterySize`, raw.
    pub battery_size: Option<u8>,
}

impl BasicAttributes {
    /// Creates an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw `powerSource` attribute.
    #[must_use]
    pub const fn with_power_source(mut self, raw: u8) -> Self {
        self.power_source = Some(raw);
        self
    }

    /// Sets the rated battery voltage in volts.
    #[must_use]
    pub const fn with_battery_rated_voltage(mut self, volts: f32) -> Self {
        self.battery_rated_voltage = Some(volts);
        self
    }

    /// Sets the rated battery voltage from its ZCL encoding (100 mV units).
    #[must_use]
    pub fn with_zcl_rated_voltage(mut self, raw: u8) -> Self {
        self.battery_rated_voltage = Some(f32::from(raw) / 10.0);
        self
    }

    /// Sets the raw `BatterySize` attribute.
    #[must_use]
    pub const fn with_battery_size(mut self, raw: u8) -> Self {
        self.battery_size = Some(raw);
        self
    }
}

/// ZCL value meaning "not available" for one-byte battery attributes.
const ZCL_INVALID: u8 = 0xff;

/// A power configuration cluster attribute report.
///
/// # Examples
///
/// ```
/// use meshdp_lib::power::PowerConfigReport;
/// use meshdp_lib::types::BatteryChemistry;
///
/// let report = PowerConfigReport::new().with_battery_voltage(28);
/// assert_eq!(report.battery_percentage(Some(BatteryChemistry::Cr2032)), Some(65));
/// assert_eq!(report.battery_percentage(Some(BatteryChemistry::Aaa)), Some(100));
///
/// // A reported percentage wins over the voltage.
/// let report = report.with_percentage_remaining(120);
/// assert_eq!(report.battery_percentage(Some(BatteryChemistry::Cr2032)), Some(60));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerConfigReport {
    /// `BatteryVoltage`, in 100 mV units.
    pub battery_voltage: Option<u8>,
    /// `BatteryPercentageRemaining`, in half-percent units.
    pub battery_percentage_remaining: Option<u8>,
}

impl PowerConfigReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw `BatteryVoltage` attribute.
    #[must_use]
    pub const fn with_battery_voltage(mut self, raw: u8) -> Self {
        self.battery_voltage = Some(raw);
        self
    }

    /// Sets the raw `BatteryPercentageRemaining` attribute.
    #[must_use]
    pub const fn with_percentage_remaining(mut self, raw: u8) -> Self {
        self.battery_percentage_remaining = Some(raw);
        self
    }

    /// Returns the battery level in percent, if the report carries one.
    ///
    /// The device's own percentage is preferred. Otherwise the voltage is
    /// read on the discharge curve of `chemistry`.
    #[must_use]
    pub fn battery_percentage(&self, chemistry: Option<BatteryChemistry>) -> Option<u8> {
        if let Some(raw) = self.battery_percentage_remaining
            && raw != ZCL_INVALID
        {
            return Some(battery_percentage_from_zcl(raw));
        }

        let raw = self
            .battery_voltage
            .filter(|raw| *raw != 0 && *raw != ZCL_INVALID)?;
        let chemistry = chemistry.unwrap_or(BatteryChemistry::Unknown);
        Some(chemistry.percentage_from_voltage(f32::from(raw) / 10.0))
    }
}

/// Classifies a device's power supply.
///
/// `hint` narrows the chemistry inside the class the voltage points to:
/// a `Cr2450` hint picks CR2450 over CR2032, an `Aa` hint picks AA over AAA.
/// A hint never overrides the voltage class itself.
///
/// This is a pure function; calling it twice with the same inputs yields
/// the same profile.
///
/// # Examples
///
/// ```
/// use meshdp_lib::power::{BasicAttributes, detect};
/// use meshdp_lib::types::{BatteryChemistry, PowerProfile};
///
/// let mains = BasicAttributes::new().with_power_source(0x01);
/// assert_eq!(detect(&mains, true, None), PowerProfile::mains());
///
/// let coin = BasicAttributes::new().with_battery_rated_voltage(3.0);
/// assert_eq!(
///     detect(&coin, true, None),
///     PowerProfile::battery(BatteryChemistry::Cr2032)
/// );
///
/// // No battery cluster: conservative fallback.
/// assert_eq!(detect(&BasicAttributes::new(), false, None), PowerProfile::mains());
/// ```
#[must_use]
pub fn detect(
    attrs: &BasicAttributes,
    power_config_present: bool,
    hint: Option<BatteryChemistry>,
) -> PowerProfile {
    match attrs.power_source.map(|raw| raw & !SECONDARY_BATTERY_FLAG) {
        Some(0x01 | 0x02 | 0x05 | 0x06) => return PowerProfile::mains(),
        Some(0x04) => return PowerProfile::dc(),
        _ => {}
    }

    if power_config_present {
        PowerProfile::battery(infer_chemistry(attrs, hint))
    } else {
        PowerProfile::mains()
    }
}

fn infer_chemistry(attrs: &BasicAttributes, hint: Option<BatteryChemistry>) -> BatteryChemistry {
    let size = attrs.battery_size;

    match attrs.battery_rated_voltage {
        Some(v) if v > COIN_CELL_MIN_VOLTS => {
            if hint == Some(BatteryChemistry::Cr2450) {
                BatteryChemistry::Cr2450
            } else {
                BatteryChemistry::Cr2032
            }
        }
        Some(v) if v > 0.0 && v <= ALKALINE_MAX_VOLTS => {
            if hint == Some(BatteryChemistry::Aa) || size == Some(BATTERY_SIZE_AA) {
                BatteryChemistry::Aa
            } else {
                BatteryChemistry::Aaa
            }
        }
        Some(_) => BatteryChemistry::Unknown,
        None => match size {
            Some(BATTERY_SIZE_AA) => BatteryChemistry::Aa,
            Some(BATTERY_SIZE_AAA) => BatteryChemistry::Aaa,
            _ => BatteryChemistry::Unknown,
        },
    }
}
