// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};

use super::{CapabilityHost, ManualScheduler, Scheduler, TimerHandle, TimerToken, Transport};
use crate::capabilities::CapabilityDecision;
use crate::event::DeviceEvent;
use crate::press::PressEvent;
use crate::types::Timestamp;

/// A host that records every call, driven by a [`ManualScheduler`].
///
/// Useful for simulations and tests: frames sent, capabilities registered
/// and events published are all kept for inspection.
#[derive(Debug, Default)]
pub struct RecordingHost {
    /// Simulated clock.
    pub scheduler: ManualScheduler,
    /// Encoded frames handed to the transport, in order.
    pub sent: Vec<Vec<u8>>,
    /// Currently registered capabilities.
    pub registered: BTreeMap<String, CapabilityDecision>,
    /// Every deregistration, in order.
    pub deregistered: Vec<String>,
    /// Every published event, in order.
    pub events: Vec<DeviceEvent>,
}

impl RecordingHost {
    /// Creates a host at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host around a preconfigured clock.
    #[must_use]
    pub fn with_scheduler(scheduler: ManualScheduler) -> Self {
        Self {
            scheduler,
            ..Self::default()
        }
    }

    /// Returns the classified presses published so far.
    #[must_use]
    pub fn presses(&self) -> Vec<PressEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::ButtonPressed { press, .. } => Some(*press),
                _ => None,
            })
            .collect()
    }

    /// Drains and returns the recorded events.
    pub fn take_events(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Scheduler for RecordingHost {
    fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        self.scheduler.wall_clock()
    }

    fn utc_offset(&self) -> FixedOffset {
        self.scheduler.utc_offset()
    }

    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        self.scheduler.schedule(delay, token)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.scheduler.cancel(handle);
    }
}

impl Transport for RecordingHost {
    fn send(&mut self, frame: Vec<u8>) {
        self.sent.push(frame);
    }
}

impl CapabilityHost for RecordingHost {
    fn register_capability(&mut self, name: &str, decision: &CapabilityDecision) {
        self.registered.insert(name.to_string(), *decision);
    }

    fn deregister_capability(&mut self, name: &str) {
        self.registered.remove(name);
        self.deregistered.push(name.to_string());
    }

    fn publish(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }
}
