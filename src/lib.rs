// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `meshdp` Lib - the vendor data-point protocol of mesh home-automation
//! devices.
//!
//! Many low-cost mesh devices tunnel their application data through one
//! proprietary cluster as typed data points (DPs). This library speaks that
//! protocol and adds the device logic that usually sits around it.
//!
//! # Supported Features
//!
//! - **DP codec**: typed records, frames, split-packet reassembly
//! - **Transactions**: sequence correlation, timeout and retransmission
//! - **Power detection**: mains, DC or battery with chemistry inference
//! - **Capabilities**: per-family tables resolved once against the power source
//! - **Buttons**: single, double and long press classification from raw edges
//! - **Time sync**: replies to device clock requests
//!
//! # Architecture
//!
//! The core is synchronous and owns no clock or thread. A
//! [`DeviceSession`] holds the state of one device and talks to the
//! outside world through the [`host`] traits. The `runtime` feature (on by
//! default) adds [`runtime::DeviceRuntime`], which runs a session on a
//! tokio task with tokio timers.
//!
//! # Quick Start
//!
//! ## Driving a session by hand
//!
//! ```
//! use meshdp_lib::capabilities::CapabilityTable;
//! use meshdp_lib::device::{DeviceSession, SessionConfig};
//! use meshdp_lib::event::DeviceId;
//! use meshdp_lib::host::RecordingHost;
//! use meshdp_lib::power::BasicAttributes;
//! use meshdp_lib::press::{ButtonEdge, PressKind};
//! use meshdp_lib::types::{Endpoint, Timestamp};
//!
//! let family = CapabilityTable::builtin().get("button")?.clone();
//! let mut session = DeviceSession::new(DeviceId::new(), family, SessionConfig::default());
//! let mut host = RecordingHost::new();
//!
//! let coin_cell = BasicAttributes::new().with_battery_rated_voltage(3.0);
//! session.initialize(&coin_cell, true, &mut host)?;
//!
//! let ep = Endpoint::new(1);
//! session.on_button_edge(ep, ButtonEdge::Down, &mut host)?;
//! host.scheduler.set_time(Timestamp::from_millis(50));
//! session.on_button_edge(ep, ButtonEdge::Up, &mut host)?;
//!
//! while let Some(token) = host.scheduler.pop_due(Timestamp::from_millis(500)) {
//!     session.on_timer_fired(token, &mut host);
//! }
//! assert_eq!(host.presses()[0].kind, PressKind::Single);
//! # Ok::<(), meshdp_lib::Error>(())
//! ```
//!
//! ## Running a session on tokio
//!
//! ```no_run
//! use meshdp_lib::capabilities::CapabilityTable;
//! use meshdp_lib::datapoints::CapabilityValue;
//! use meshdp_lib::device::{DeviceSession, SessionConfig};
//! use meshdp_lib::event::{DeviceId, EventBus};
//! use meshdp_lib::power::BasicAttributes;
//! use meshdp_lib::runtime::DeviceRuntime;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> meshdp_lib::Result<()> {
//!     let family = CapabilityTable::builtin().get("plug")?.clone();
//!     let session = DeviceSession::new(
//!         DeviceId::from_ieee_address(0x00124b0012345678),
//!         family,
//!         SessionConfig::default(),
//!     );
//!
//!     let bus = EventBus::new();
//!     let mut events = bus.subscribe();
//!     let (radio_tx, mut radio_rx) = mpsc::unbounded_channel();
//!     let device = DeviceRuntime::spawn(session, bus, radio_tx);
//!
//!     device
//!         .initialize(BasicAttributes::new().with_power_source(0x01), false)
//!         .await?;
//!     device.set_capability("onoff", CapabilityValue::Bool(true)).await?;
//!
//!     // Hand `radio_rx` frames to the radio, feed received packets back
//!     // with `device.packet_received(..)`, and watch `events`.
//!     let _frame = radio_rx.recv().await;
//!     let _event = events.recv().await;
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod datapoints;
pub mod device;
pub mod error;
pub mod event;
pub mod host;
pub mod power;
pub mod press;
pub mod protocol;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod transaction;
pub mod types;

pub use capabilities::{CapabilityDecision, CapabilitySet, CapabilityTable, FamilyProfile};
pub use datapoints::{CapabilityValue, DpMapping};
pub use device::{DeviceSession, SessionConfig, SessionState};
pub use error::{
    ConfigError, DecodeError, DeviceError, EncodeError, Error, Result, TransactionError,
};
pub use event::{DeviceEvent, DeviceId};
#[cfg(feature = "runtime")]
pub use event::EventBus;
pub use host::{CapabilityHost, DeviceHost, Scheduler, Transport};
pub use power::{BasicAttributes, PowerConfigReport};
pub use press::{ButtonEdge, PressEvent, PressKind, PressTiming};
pub use protocol::{Frame, FrameKind};
#[cfg(feature = "runtime")]
pub use runtime::DeviceRuntime;
pub use transaction::{TransactionConfig, TransactionId};
pub use types::{BatteryChemistry, DataPoint, DpType, DpValue, Endpoint, PowerProfile, Timestamp};
