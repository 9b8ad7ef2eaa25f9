// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events published by device sessions.
//!
//! A [`DeviceSession`](crate::device::DeviceSession) hands every
//! [`DeviceEvent`] to its host. With the `runtime` feature, the
//! [`EventBus`] fans them out to any number of subscribers over a tokio
//! broadcast channel.
//!
//! # Examples
//!
//! ```
//! use meshdp_lib::event::{DeviceEvent, DeviceId, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! let device_id = DeviceId::new();
//! bus.publish(DeviceEvent::TornDown { device_id });
//! assert_eq!(rx.try_recv().unwrap().device_id(), device_id);
//! ```

mod device_event;
mod device_id;
#[cfg(feature = "runtime")]
mod event_bus;

pub use device_event::DeviceEvent;
pub use device_id::DeviceId;
#[cfg(feature = "runtime")]
pub use event_bus::EventBus;
