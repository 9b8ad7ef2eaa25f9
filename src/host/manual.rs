// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};

use super::{Scheduler, TimerHandle, TimerToken};
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy)]
struct Armed {
    handle: TimerHandle,
    due: Timestamp,
    token: TimerToken,
}

/// A simulated clock for driving a device session deterministically.
///
/// Time only moves when the caller says so. Timers fire in deadline order,
/// ties in arming order.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use meshdp_lib::host::{ManualScheduler, Scheduler, TimerKind, TimerToken};
/// use meshdp_lib::types::Timestamp;
///
/// let mut clock = ManualScheduler::new();
/// let token = TimerToken::new(TimerKind::TransactionSweep, 0);
/// clock.schedule(Duration::from_millis(500), token);
///
/// assert_eq!(clock.pop_due(Timestamp::from_millis(400)), None);
/// assert_eq!(clock.now(), Timestamp::from_millis(400));
///
/// assert_eq!(clock.pop_due(Timestamp::from_millis(1_000)), Some(token));
/// assert_eq!(clock.now(), Timestamp::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    now: Timestamp,
    wall_origin: DateTime<Utc>,
    offset: FixedOffset,
    next_handle: u64,
    armed: Vec<Armed>,
}

impl ManualScheduler {
    /// Creates a clock at time zero with the wall clock at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Timestamp::ZERO,
            wall_origin: DateTime::UNIX_EPOCH,
            offset: Utc.fix(),
            next_handle: 0,
            armed: Vec::new(),
        }
    }

    /// Sets the wall clock time that corresponds to time zero.
    #[must_use]
    pub fn with_wall_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.wall_origin = origin;
        self
    }

    /// Sets the local time zone offset.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Removes and returns the earliest timer due at or before `until`,
    /// moving the clock to its deadline.
    ///
    /// When nothing is due the clock moves to `until` and `None` is returned.
    pub fn pop_due(&mut self, until: Timestamp) -> Option<TimerToken> {
        let index = self
            .armed
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.handle))
            .map(|(i, _)| i);

        match index {
            Some(i) => {
                let timer = self.armed.remove(i);
                self.now = self.now.max(timer.due);
                Some(timer.token)
            }
            None => {
                self.now = self.now.max(until);
                None
            }
        }
    }

    /// Moves the clock without firing anything.
    pub fn set_time(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Returns the number of armed timers.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Returns the earliest armed deadline.
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.armed.iter().map(|t| t.due).min()
    }

    /// Returns true if the handle is still armed.
    #[must_use]
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.armed.iter().any(|t| t.handle == handle)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let elapsed = i64::try_from(self.now.as_millis()).unwrap_or(i64::MAX);
        self.wall_origin
            .checked_add_signed(TimeDelta::milliseconds(elapsed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn utc_offset(&self) -> FixedOffset {
        self.offset
    }

    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        let handle = TimerHandle::new(self.next_handle);
        self.next_handle += 1;
        self.armed.push(Armed {
            handle,
            due: self.now + delay,
            token,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.retain(|t| t.handle != handle);
    }
}
