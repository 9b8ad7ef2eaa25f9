// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mapping of reported data points onto capabilities.
//!
//! Each device family declares which data-point ids carry which capability
//! and how the raw value converts. The mapping is part of the family's
//! [`FamilyProfile`](crate::capabilities::FamilyProfile) and loads from the
//! same JSON table:
//!
//! ```json
//! { "dp": 2, "capability": "measure_temperature", "kind": "scaled", "divisor": 10 }
//! { "dp": 1, "kind": "enum_press", "endpoint": 1 }
//! { "dp": 33, "capability": "measure_battery", "kind": "battery_voltage", "divisor": 1000 }
//! ```
//!
//! Battery voltages become percentages through the discharge curve of the
//! chemistry detected for the device, so the same reading maps to different
//! levels on a coin cell and on an alkaline cell.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::press::{PressEvent, PressKind};
use crate::types::{BatteryChemistry, DataPoint, DpValue, Endpoint};

/// A capability value pushed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    /// On/off style value.
    Bool(bool),
    /// Measured or set-point value.
    Number(f64),
    /// Free text.
    Text(String),
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// How one data point maps onto the device model.
///
/// # Examples
///
/// ```
/// use meshdp_lib::datapoints::{CapabilityValue, DpMapping, Mapped};
/// use meshdp_lib::types::DataPoint;
///
/// let temp = DpMapping::scaled(1, "measure_temperature", 10.0);
/// let mapped = temp.convert(&DataPoint::value(1, 215)).unwrap();
/// assert_eq!(
///     mapped,
///     Mapped::Capability {
///         capability: "measure_temperature".into(),
///         value: CapabilityValue::Number(21.5),
///     }
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DpMapping {
    /// Boolean capability. Numeric values read as `!= 0`.
    Bool {
        /// Data-point id.
        dp: u8,
        /// Target capability.
        capability: String,
    },
    /// Numeric capability, raw value divided by `divisor`.
    Scaled {
        /// Data-point id.
        dp: u8,
        /// Target capability.
        capability: String,
        /// Divisor applied to the raw integer.
        divisor: f64,
    },
    /// Percentage clamped to 0..=100.
    Percent {
        /// Data-point id.
        dp: u8,
        /// Target capability.
        capability: String,
    },
    /// Cell voltage, raw value divided by `divisor`, read as a battery
    /// percentage.
    BatteryVoltage {
        /// Data-point id.
        dp: u8,
        /// Target capability.
        capability: String,
        /// Divisor that turns the raw integer into volts.
        divisor: f64,
    },
    /// Text capability.
    Text {
        /// Data-point id.
        dp: u8,
        /// Target capability.
        capability: String,
    },
    /// Press already classified by the device: 0 single, 1 double, 2 long.
    EnumPress {
        /// Data-point id.
        dp: u8,
        /// Button endpoint the press belongs to.
        endpoint: Endpoint,
    },
}

/// The result of converting a data point.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    /// A new capability value.
    Capability {
        /// Capability name.
        capability: String,
        /// Converted value.
        value: CapabilityValue,
    },
    /// A device-classified button press.
    Press(PressEvent),
}

impl DpMapping {
    /// Creates a boolean mapping.
    #[must_use]
    pub fn bool(dp: u8, capability: impl Into<String>) -> Self {
        Self::Bool {
            dp,
            capability: capability.into(),
        }
    }

    /// Creates a scaled numeric mapping.
    #[must_use]
    pub fn scaled(dp: u8, capability: impl Into<String>, divisor: f64) -> Self {
        Self::Scaled {
            dp,
            capability: capability.into(),
            divisor,
        }
    }

    /// Creates a percentage mapping.
    #[must_use]
    pub fn percent(dp: u8, capability: impl Into<String>) -> Self {
        Self::Percent {
            dp,
            capability: capability.into(),
        }
    }

    /// Creates a battery voltage mapping.
    #[must_use]
    pub fn battery_voltage(dp: u8, capability: impl Into<String>, divisor: f64) -> Self {
        Self::BatteryVoltage {
            dp,
            capability: capability.into(),
            divisor,
        }
    }

    /// Creates a text mapping.
    #[must_use]
    pub fn text(dp: u8, capability: impl Into<String>) -> Self {
        Self::Text {
            dp,
            capability: capability.into(),
        }
    }

    /// Creates a device-classified press mapping.
    #[must_use]
    pub const fn enum_press(dp: u8, endpoint: Endpoint) -> Self {
        Self::EnumPress { dp, endpoint }
    }

    /// Returns the data-point id this mapping reads.
    #[must_use]
    pub const fn dp(&self) -> u8 {
        match self {
            Self::Bool { dp, .. }
            | Self::Scaled { dp, .. }
            | Self::Percent { dp, .. }
            | Self::BatteryVoltage { dp, .. }
            | Self::Text { dp, .. }
            | Self::EnumPress { dp, .. } => *dp,
        }
    }

    /// Returns the target capability, or `None` for press mappings.
    #[must_use]
    pub fn capability(&self) -> Option<&str> {
        match self {
            Self::Bool { capability, .. }
            | Self::Scaled { capability, .. }
            | Self::Percent { capability, .. }
            | Self::BatteryVoltage { capability, .. }
            | Self::Text { capability, .. } => Some(capability),
            Self::EnumPress { .. } => None,
        }
    }

    /// Converts a reported data point.
    ///
    /// Battery voltages are read against an unknown chemistry. Use
    /// [`convert_with`](Self::convert_with) when the chemistry is known.
    ///
    /// Returns `None` when the value cannot be read under this mapping (for
    /// example raw bytes on a percentage, or an unknown press index).
    #[must_use]
    pub fn convert(&self, dp: &DataPoint) -> Option<Mapped> {
        self.convert_with(dp, None)
    }

    /// Converts a reported data point for a device with the given battery
    /// chemistry.
    ///
    /// # Examples
    ///
    /// ```
    /// use meshdp_lib::datapoints::{CapabilityValue, DpMapping, Mapped};
    /// use meshdp_lib::types::{BatteryChemistry, DataPoint};
    ///
    /// let battery = DpMapping::battery_voltage(33, "measure_battery", 1000.0);
    /// let reading = DataPoint::value(33, 1_300);
    ///
    /// let level = |chemistry| match battery.convert_with(&reading, Some(chemistry)) {
    ///     Some(Mapped::Capability { value: CapabilityValue::Number(n), .. }) => n,
    ///     other => panic!("{other:?}"),
    /// };
    /// assert_eq!(level(BatteryChemistry::Aaa), 50.0);
    /// assert_eq!(level(BatteryChemistry::Cr2032), 0.0);
    /// ```
    #[must_use]
    pub fn convert_with(
        &self,
        dp: &DataPoint,
        chemistry: Option<BatteryChemistry>,
    ) -> Option<Mapped> {
        let capability_value = |value| {
            self.capability().map(|name| Mapped::Capability {
                capability: name.to_owned(),
                value,
            })
        };

        match self {
            Self::Bool { .. } => {
                let on = match &dp.value {
                    DpValue::Bool(b) => *b,
                    other => other.as_i64()? != 0,
                };
                capability_value(CapabilityValue::Bool(on))
            }
            Self::Scaled { divisor, .. } => {
                if *divisor == 0.0 {
                    return None;
                }
                let raw = dp.value.as_i64()?;
                capability_value(CapabilityValue::Number(to_f64(raw) / divisor))
            }
            Self::Percent { .. } => {
                let raw = dp.value.as_i64()?.clamp(0, 100);
                capability_value(CapabilityValue::Number(to_f64(raw)))
            }
            Self::BatteryVoltage { divisor, .. } => {
                if *divisor == 0.0 {
                    return None;
                }
                let volts = to_f32(to_f64(dp.value.as_i64()?) / divisor);
                let percent = chemistry
                    .unwrap_or(BatteryChemistry::Unknown)
                    .percentage_from_voltage(volts);
                capability_value(CapabilityValue::Number(f64::from(percent)))
            }
            Self::Text { .. } => {
                let text = match &dp.value {
                    DpValue::String(s) => s.clone(),
                    other => other.as_i64()?.to_string(),
                };
                capability_value(CapabilityValue::Text(text))
            }
            Self::EnumPress { endpoint, .. } => {
                let kind = match dp.value {
                    DpValue::Enum(0) => PressKind::Single,
                    DpValue::Enum(1) => PressKind::Double,
                    DpValue::Enum(2) => PressKind::Long,
                    _ => return None,
                };
                Some(Mapped::Press(PressEvent::new(*endpoint, kind)))
            }
        }
    }

    /// Converts a capability value back into the data point that sets it.
    ///
    /// Returns `None` for press mappings and for values of the wrong shape.
    /// Numbers are rounded after scaling and must fit a 32-bit integer.
    ///
    /// # Examples
    ///
    /// ```
    /// use meshdp_lib::datapoints::{CapabilityValue, DpMapping};
    /// use meshdp_lib::types::DataPoint;
    ///
    /// let dim = DpMapping::scaled(2, "dim", 1000.0);
    /// assert_eq!(
    ///     dim.to_datapoint(&CapabilityValue::Number(0.5)),
    ///     Some(DataPoint::value(2, 500))
    /// );
    /// ```
    #[must_use]
    pub fn to_datapoint(&self, value: &CapabilityValue) -> Option<DataPoint> {
        match (self, value) {
            (Self::Bool { dp, .. }, CapabilityValue::Bool(b)) => Some(DataPoint::bool(*dp, *b)),
            (Self::Scaled { dp, divisor, .. }, CapabilityValue::Number(n)) => {
                to_i32(n * divisor).map(|v| DataPoint::value(*dp, v))
            }
            (Self::Percent { dp, .. }, CapabilityValue::Number(n)) => {
                to_i32(n.clamp(0.0, 100.0)).map(|v| DataPoint::value(*dp, v))
            }
            (Self::Text { dp, .. }, CapabilityValue::Text(s)) => Some(DataPoint::string(*dp, s)),
            _ => None,
        }
    }
}

/// Finds the mapping for a data-point id.
#[must_use]
pub fn find(mappings: &[DpMapping], dp: u8) -> Option<&DpMapping> {
    mappings.iter().find(|m| m.dp() == dp)
}

/// Finds the writable mapping of a capability.
#[must_use]
pub fn find_capability<'a>(mappings: &'a [DpMapping], capability: &str) -> Option<&'a DpMapping> {
    mappings.iter().find(|m| m.capability() == Some(capability))
}

#[allow(clippy::cast_possible_truncation)]
fn to_i32(value: f64) -> Option<i32> {
    let rounded = value.round();
    // Range checked, so the cast cannot saturate.
    (rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX))
        .then_some(rounded as i32)
}

#[allow(clippy::cast_possible_truncation)]
const fn to_f32(volts: f64) -> f32 {
    volts as f32
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(raw: i64) -> f64 {
    // Data-point integers are 32-bit, so this is exact.
    raw as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(mapped: Option<Mapped>) -> (String, CapabilityValue) {
        match mapped {
            Some(Mapped::Capability { capability, value }) => (capability, value),
            other => panic!("expected capability value, got {other:?}"),
        }
    }

    #[test]
    fn bool_mapping_reads_bool_and_numbers() {
        let m = DpMapping::bool(1, "onoff");
        assert_eq!(
            capability(m.convert(&DataPoint::bool(1, true))),
            ("onoff".to_string(), CapabilityValue::Bool(true))
        );
        assert_eq!(
            capability(m.convert(&DataPoint::enumeration(1, 0))).1,
            CapabilityValue::Bool(false)
        );
        assert_eq!(m.convert(&DataPoint::string(1, "on")), None);
    }

    #[test]
    fn scaled_mapping_divides() {
        let m = DpMapping::scaled(19, "measure_power", 10.0);
        assert_eq!(
            capability(m.convert(&DataPoint::value(19, -125))).1,
            CapabilityValue::Number(-12.5)
        );
    }

    #[test]
    fn scaled_mapping_with_zero_divisor_is_ignored() {
        let m = DpMapping::scaled(19, "measure_power", 0.0);
        assert_eq!(m.convert(&DataPoint::value(19, 5)), None);
    }

    #[test]
    fn percent_mapping_clamps() {
        let m = DpMapping::percent(15, "measure_battery");
        assert_eq!(
            capability(m.convert(&DataPoint::value(15, 130))).1,
            CapabilityValue::Number(100.0)
        );
        assert_eq!(
            capability(m.convert(&DataPoint::value(15, -3))).1,
            CapabilityValue::Number(0.0)
        );
    }

    #[test]
    fn battery_voltage_follows_chemistry() {
        let m = DpMapping::battery_voltage(33, "measure_battery", 1000.0);
        let reading = DataPoint::value(33, 2_750);
        assert_eq!(
            capability(m.convert_with(&reading, Some(BatteryChemistry::Cr2032))).1,
            CapabilityValue::Number(50.0)
        );
        assert_eq!(
            capability(m.convert_with(&reading, Some(BatteryChemistry::Aa))).1,
            CapabilityValue::Number(100.0)
        );
        // Unknown cells read as CR2032.
        assert_eq!(
            capability(m.convert(&reading)).1,
            CapabilityValue::Number(50.0)
        );
        assert_eq!(m.to_datapoint(&CapabilityValue::Number(50.0)), None);
    }

    #[test]
    fn battery_voltage_with_zero_divisor_is_ignored() {
        let m = DpMapping::battery_voltage(33, "measure_battery", 0.0);
        assert_eq!(m.convert(&DataPoint::value(33, 3_000)), None);
    }

    #[test]
    fn text_mapping() {
        let m = DpMapping::text(7, "firmware");
        assert_eq!(
            capability(m.convert(&DataPoint::string(7, "1.0.4"))).1,
            CapabilityValue::Text("1.0.4".into())
        );
        assert_eq!(
            capability(m.convert(&DataPoint::enumeration(7, 3))).1,
            CapabilityValue::Text("3".into())
        );
    }

    #[test]
    fn enum_press_mapping() {
        let m = DpMapping::enum_press(2, Endpoint::new(2));
        assert_eq!(
            m.convert(&DataPoint::enumeration(2, 2)),
            Some(Mapped::Press(PressEvent::new(Endpoint::new(2), PressKind::Long)))
        );
        assert_eq!(m.convert(&DataPoint::enumeration(2, 7)), None);
        assert_eq!(m.capability(), None);
    }

    #[test]
    fn deserializes_tagged_kinds() {
        let json = r#"[
            {"dp": 1, "capability": "onoff", "kind": "bool"},
            {"dp": 2, "capability": "measure_temperature", "kind": "scaled", "divisor": 10},
            {"dp": 3, "kind": "enum_press", "endpoint": 1},
            {"dp": 4, "capability": "measure_battery", "kind": "battery_voltage", "divisor": 10}
        ]"#;
        let mappings: Vec<DpMapping> = serde_json::from_str(json).unwrap();
        assert_eq!(mappings[0], DpMapping::bool(1, "onoff"));
        assert_eq!(mappings[1], DpMapping::scaled(2, "measure_temperature", 10.0));
        assert_eq!(mappings[2], DpMapping::enum_press(3, Endpoint::new(1)));
        assert_eq!(
            mappings[3],
            DpMapping::battery_voltage(4, "measure_battery", 10.0)
        );
        assert_eq!(find(&mappings, 2).map(DpMapping::dp), Some(2));
        assert!(find(&mappings, 9).is_none());
    }

    #[test]
    fn writes_convert_back() {
        assert_eq!(
            DpMapping::bool(1, "onoff").to_datapoint(&CapabilityValue::Bool(false)),
            Some(DataPoint::bool(1, false))
        );
        assert_eq!(
            DpMapping::percent(4, "level").to_datapoint(&CapabilityValue::Number(140.0)),
            Some(DataPoint::value(4, 100))
        );
        assert_eq!(
            DpMapping::text(5, "mode").to_datapoint(&CapabilityValue::Text("eco".into())),
            Some(DataPoint::string(5, "eco"))
        );
    }

    #[test]
    fn writes_of_wrong_shape_are_rejected() {
        let onoff = DpMapping::bool(1, "onoff");
        assert_eq!(onoff.to_datapoint(&CapabilityValue::Number(1.0)), None);
        let huge = DpMapping::scaled(2, "dim", 1e12);
        assert_eq!(huge.to_datapoint(&CapabilityValue::Number(1.0)), None);
        let press = DpMapping::enum_press(3, Endpoint::new(1));
        assert_eq!(press.to_datapoint(&CapabilityValue::Bool(true)), None);
    }

    #[test]
    fn find_capability_skips_press_mappings() {
        let mappings = vec![
            DpMapping::enum_press(1, Endpoint::new(1)),
            DpMapping::percent(10, "measure_battery"),
        ];
        assert_eq!(
            find_capability(&mappings, "measure_battery").map(DpMapping::dp),
            Some(10)
        );
        assert!(find_capability(&mappings, "onoff").is_none());
    }

    #[test]
    fn capability_value_display() {
        assert_eq!(CapabilityValue::Number(21.5).to_string(), "21.5");
        assert_eq!(CapabilityValue::Bool(true).to_string(), "true");
    }
}
