// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device protocol sessions.
//!
//! A [`DeviceSession`] owns everything the library tracks for one device:
//! frame reassembly, the sequence counter, in-flight commands, button
//! state and the capability set resolved at initialization. The hosting
//! framework drives it through a handful of entry points:
//!
//! | Entry point | Called when |
//! |-------------|-------------|
//! | [`initialize`](DeviceSession::initialize) | the device interview finished |
//! | [`on_frame_received`](DeviceSession::on_frame_received) | a radio packet arrived |
//! | [`on_button_edge`](DeviceSession::on_button_edge) | a raw contact edge arrived |
//! | [`on_power_config_report`](DeviceSession::on_power_config_report) | the battery cluster reported |
//! | [`on_timer_fired`](DeviceSession::on_timer_fired) | a timer armed by the session fired |
//! | [`set_capability`](DeviceSession::set_capability) | the user changed a value |
//! | [`teardown`](DeviceSession::teardown) | the device was removed |
//!
//! Sessions share nothing, so a misbehaving device cannot disturb another.

mod config;
mod session;

pub use config::{DEFAULT_DECODE_FAILURE_THRESHOLD, DEFAULT_REASSEMBLY_TIMEOUT, SessionConfig};
pub use session::{DeviceSession, SessionState};
