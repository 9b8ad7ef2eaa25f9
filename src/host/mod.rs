// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborator interfaces the device core calls through.
//!
//! The core owns no clock, timer, radio or capability registry. Everything
//! it needs from the outside world goes through three traits:
//!
//! - [`Scheduler`]: monotonic and wall clock time, cancellable one-shot timers
//! - [`Transport`]: sends encoded frames to the device
//! - [`CapabilityHost`]: registers capabilities and receives [`DeviceEvent`]s
//!
//! Any type implementing all three is a [`DeviceHost`].
//!
//! # Timers
//!
//! A timer is armed with a [`TimerToken`] describing what it is for and
//! the epoch of the state it was armed against. When it fires the host hands
//! the token back. A token whose epoch no longer matches is stale and is
//! ignored, so a late firing after a cancel is harmless.

mod manual;
mod recording;

pub use manual::ManualScheduler;
pub use recording::RecordingHost;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::capabilities::CapabilityDecision;
use crate::event::DeviceEvent;
use crate::types::{Endpoint, Timestamp};

/// Handle of an armed timer, assigned by the [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Creates a handle from a scheduler-assigned id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the scheduler-assigned id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Button held long enough to count as a long press.
    LongPress(Endpoint),
    /// No further click followed a release.
    ClickSettle(Endpoint),
    /// Earliest pending transaction deadline.
    TransactionSweep,
    /// A partial frame waited too long for its next packet.
    Reassembly,
}

/// Identifies a timer firing and the state it was armed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    /// Purpose of the timer.
    pub kind: TimerKind,
    /// Epoch of the owning state when the timer was armed.
    pub epoch: u64,
}

impl TimerToken {
    /// Creates a token.
    #[must_use]
    pub const fn new(kind: TimerKind, epoch: u64) -> Self {
        Self { kind, epoch }
    }
}

/// Time source and one-shot timer facility.
pub trait Scheduler {
    /// Returns the current monotonic time.
    fn now(&self) -> Timestamp;

    /// Returns the current wall clock time.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Returns the local time zone offset used for time sync replies.
    fn utc_offset(&self) -> FixedOffset {
        Utc.fix()
    }

    /// Arms a timer that hands `token` back after `delay`.
    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle;

    /// Disarms a timer. Cancelling a fired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Outbound link to the device.
pub trait Transport {
    /// Sends one encoded frame.
    fn send(&mut self, frame: Vec<u8>);
}

/// The hosting framework's device model.
pub trait CapabilityHost {
    /// Exposes a capability, with its poll interval if any.
    fn register_capability(&mut self, name: &str, decision: &CapabilityDecision);

    /// Removes a capability.
    fn deregister_capability(&mut self, name: &str);

    /// Receives value updates, presses and failure notifications.
    fn publish(&mut self, event: DeviceEvent);
}

/// Everything a device session needs from its host.
pub trait DeviceHost: Scheduler + Transport + CapabilityHost {}

impl<T: Scheduler + Transport + CapabilityHost> DeviceHost for T {}
