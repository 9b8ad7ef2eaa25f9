// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::capabilities::CapabilityDecision;
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::host::{CapabilityHost, Scheduler, TimerHandle, TimerToken, Transport};
use crate::types::Timestamp;

/// A timer that fired, as delivered back to the session task.
pub(super) type Fired = (TimerHandle, TimerToken);

/// Host side of a runtime-driven session.
///
/// Timers are sleeping tasks that post their token back on `fired`.
pub(super) struct RuntimeHost {
    device_id: DeviceId,
    started: Instant,
    next_handle: u64,
    timers: HashMap<TimerHandle, JoinHandle<()>>,
    fired: mpsc::UnboundedSender<Fired>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    events: EventBus,
}

impl RuntimeHost {
    pub(super) fn new(
        device_id: DeviceId,
        fired: mpsc::UnboundedSender<Fired>,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        events: EventBus,
    ) -> Self {
        Self {
            device_id,
            started: Instant::now(),
            next_handle: 0,
            timers: HashMap::new(),
            fired,
            outbound,
            events,
        }
    }

    /// Forgets a timer whose token was just delivered.
    pub(super) fn timer_fired(&mut self, handle: TimerHandle) {
        self.timers.remove(&handle);
    }

    /// Returns the number of timers still sleeping.
    pub(super) fn armed(&self) -> usize {
        self.timers.len()
    }

    /// Aborts every sleeping timer.
    pub(super) fn abort_all(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}

impl Drop for RuntimeHost {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl Scheduler for RuntimeHost {
    fn now(&self) -> Timestamp {
        let elapsed = self.started.elapsed().as_millis();
        Timestamp::from_millis(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn utc_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }

    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        let handle = TimerHandle::new(self.next_handle);
        self.next_handle += 1;

        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The session task may already be gone.
            let _ = fired.send((handle, token));
        });
        self.timers.insert(handle, task);

        tracing::trace!(device_id = %self.device_id, %handle, ?delay, "Timer armed");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.timers.remove(&handle) {
            task.abort();
            tracing::trace!(device_id = %self.device_id, %handle, "Timer cancelled");
        }
    }
}

impl Transport for RuntimeHost {
    fn send(&mut self, frame: Vec<u8>) {
        if self.outbound.send(frame).is_err() {
            tracing::warn!(device_id = %self.device_id, "Outbound channel closed, frame dropped");
        }
    }
}

impl CapabilityHost for RuntimeHost {
    fn register_capability(&mut self, name: &str, decision: &CapabilityDecision) {
        tracing::debug!(
            device_id = %self.device_id,
            capability = name,
            poll_interval = ?decision.poll_interval,
            "Capability registered"
        );
    }

    fn deregister_capability(&mut self, name: &str) {
        tracing::debug!(device_id = %self.device_id, capability = name, "Capability removed");
    }

    fn publish(&mut self, event: DeviceEvent) {
        self.events.publish(event);
    }
}
