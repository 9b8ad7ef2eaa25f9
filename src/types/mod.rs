// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! # Types
//!
//! - [`DataPoint`] - A typed `(id, type, value)` unit of vendor cluster data
//! - [`DpType`] / [`DpValue`] / [`Bitmap`] - Wire type tags and their values
//! - [`PowerProfile`] - Mains, DC or battery classification of a device
//! - [`BatteryChemistry`] - Coin cell or alkaline cell format
//! - [`Timestamp`] - Milliseconds on the host scheduler clock
//! - [`Endpoint`] - A logical button endpoint

mod datapoint;
mod power;
mod timestamp;

pub use datapoint::{Bitmap, DataPoint, DpType, DpValue};
pub use power::{BatteryChemistry, PowerProfile, PowerSource};
pub use timestamp::{Endpoint, Timestamp};
