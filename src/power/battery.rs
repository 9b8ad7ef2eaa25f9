// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Battery level estimation.
//!
//! Cells do not discharge linearly: a coin cell holds close to 3V for most
//! of its life and then collapses. Each chemistry has a discharge curve of
//! `(volts, percent)` points, highest voltage first, and readings between two
//! points are interpolated linearly.

use crate::types::BatteryChemistry;

const CR2032_CURVE: &[(f32, f32)] = &[
    (3.30, 100.0),
    (3.10, 98.0),
    (3.00, 95.0),
    (2.95, 90.0),
    (2.90, 85.0),
    (2.85, 75.0),
    (2.80, 65.0),
    (2.75, 50.0),
    (2.70, 40.0),
    (2.60, 25.0),
    (2.50, 15.0),
    (2.40, 8.0),
    (2.30, 4.0),
    (2.20, 2.0),
    (2.00, 0.0),
];

const CR2450_CURVE: &[(f32, f32)] = &[
    (3.30, 100.0),
    (3.10, 98.0),
    (3.00, 95.0),
    (2.95, 90.0),
    (2.90, 85.0),
    (2.85, 75.0),
    (2.80, 65.0),
    (2.75, 50.0),
    (2.70, 40.0),
    (2.60, 25.0),
    (2.50, 15.0),
    (2.40, 8.0),
    (2.30, 4.0),
    (2.00, 0.0),
];

// AA and AAA alkaline cells share a curve.
const ALKALINE_CURVE: &[(f32, f32)] = &[
    (1.65, 100.0),
    (1.55, 95.0),
    (1.50, 90.0),
    (1.45, 80.0),
    (1.40, 70.0),
    (1.35, 60.0),
    (1.30, 50.0),
    (1.25, 40.0),
    (1.20, 30.0),
    (1.15, 20.0),
    (1.10, 12.0),
    (1.05, 6.0),
    (1.00, 3.0),
    (0.90, 0.0),
];

impl BatteryChemistry {
    const fn discharge_curve(self) -> &'static [(f32, f32)] {
        match self {
            Self::Cr2450 => CR2450_CURVE,
            Self::Aaa | Self::Aa => ALKALINE_CURVE,
            // Unknown cells are read as the most common coin cell.
            Self::Cr2032 | Self::Unknown => CR2032_CURVE,
        }
    }

    /// Estimates the remaining charge, in percent, from a cell voltage.
    ///
    /// # Examples
    ///
    /// ```
    /// use meshdp_lib::types::BatteryChemistry;
    ///
    /// assert_eq!(BatteryChemistry::Cr2032.percentage_from_voltage(3.4), 100);
    /// assert_eq!(BatteryChemistry::Cr2032.percentage_from_voltage(2.75), 50);
    /// assert_eq!(BatteryChemistry::Aa.percentage_from_voltage(1.325), 55);
    /// assert_eq!(BatteryChemistry::Aaa.percentage_from_voltage(0.5), 0);
    /// ```
    #[must_use]
    pub fn percentage_from_voltage(self, volts: f32) -> u8 {
        let curve = self.discharge_curve();
        let (Some(&(top_v, _)), Some(&(bottom_v, _))) = (curve.first(), curve.last()) else {
            return 0;
        };
        if volts.is_nan() || volts <= bottom_v {
            return 0;
        }
        if volts >= top_v {
            return 100;
        }

        let percent = curve
            .windows(2)
            .find_map(|pair| {
                let [(high_v, high_p), (low_v, low_p)] = [pair[0], pair[1]];
                (volts >= low_v && volts <= high_v)
                    .then(|| low_p + (volts - low_v) / (high_v - low_v) * (high_p - low_p))
            })
            .unwrap_or(0.0);

        to_percent(percent)
    }
}

/// Converts the ZCL `batteryPercentageRemaining` attribute (half-percent
/// units, 0 to 200) to a percentage.
///
/// # Examples
///
/// ```
/// use meshdp_lib::power::battery_percentage_from_zcl;
///
/// assert_eq!(battery_percentage_from_zcl(200), 100);
/// assert_eq!(battery_percentage_from_zcl(87), 44);
/// assert_eq!(battery_percentage_from_zcl(255), 100);
/// ```
#[must_use]
pub fn battery_percentage_from_zcl(raw: u8) -> u8 {
    to_percent(f32::from(raw) / 2.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percent(value: f32) -> u8 {
    // Clamped to 0..=100 first, so the cast is lossless.
    value.clamp(0.0, 100.0).round() as u8
}
