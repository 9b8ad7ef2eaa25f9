// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use super::{ButtonEdge, ButtonPressState, PressEvent, PressKind, PressPhase, PressTiming};
use crate::host::{Scheduler, TimerKind, TimerToken};
use crate::types::Endpoint;

/// Classifies button edges for every endpoint of one device.
///
/// Endpoint state is created on the first edge and dropped on
/// [`teardown`](Self::teardown).
///
/// # Examples
///
/// ```
/// use meshdp_lib::host::ManualScheduler;
/// use meshdp_lib::press::{ButtonEdge, PressKind, PressTiming, PressTracker};
/// use meshdp_lib::types::{Endpoint, Timestamp};
///
/// let mut clock = ManualScheduler::new();
/// let mut tracker = PressTracker::new(PressTiming::default());
/// let ep = Endpoint::new(1);
///
/// tracker.on_edge(ep, ButtonEdge::Down, &mut clock);
/// clock.set_time(Timestamp::from_millis(50));
/// tracker.on_edge(ep, ButtonEdge::Up, &mut clock);
///
/// let token = clock.pop_due(Timestamp::from_millis(1_000)).unwrap();
/// let event = tracker.on_timer(token).unwrap();
/// assert_eq!(event.kind, PressKind::Single);
/// ```
#[derive(Debug)]
pub struct PressTracker {
    timing: PressTiming,
    endpoints: BTreeMap<Endpoint, ButtonPressState>,
    next_epoch: u64,
    torn_down: bool,
}

impl PressTracker {
    /// Creates a tracker with no endpoint state.
    #[must_use]
    pub const fn new(timing: PressTiming) -> Self {
        Self {
            timing,
            endpoints: BTreeMap::new(),
            next_epoch: 1,
            torn_down: false,
        }
    }

    /// Returns the timing thresholds.
    #[must_use]
    pub const fn timing(&self) -> &PressTiming {
        &self.timing
    }

    /// Returns the state of an endpoint, if it has seen an edge.
    #[must_use]
    pub fn state(&self, endpoint: Endpoint) -> Option<&ButtonPressState> {
        self.endpoints.get(&endpoint)
    }

    /// Returns the number of endpoints with state.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true after [`teardown`](Self::teardown).
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Feeds a contact edge.
    ///
    /// Returns a press when the edge completes one (a double press on the
    /// second release). Duplicate, stray and bouncing edges are ignored.
    pub fn on_edge<S>(
        &mut self,
        endpoint: Endpoint,
        edge: ButtonEdge,
        scheduler: &mut S,
    ) -> Option<PressEvent>
    where
        S: Scheduler + ?Sized,
    {
        if self.torn_down {
            return None;
        }

        let now = scheduler.now();
        let timing = self.timing;
        let epoch = self.next_epoch;
        let state = self.endpoints.entry(endpoint).or_default();

        if let Some(last) = state.last_edge_at
            && now.duration_since(last) < timing.debounce
        {
            tracing::trace!(%endpoint, ?edge, "Ignoring bouncing edge");
            return None;
        }

        let mut emitted = None;
        match (state.phase, edge) {
            (PressPhase::Idle, ButtonEdge::Down) => {
                state.suppress_release = false;
                state.pending_clicks = 0;
                state.pressed_at = Some(now);
                state.phase = PressPhase::ArmedLong;
                state.epoch = epoch;
                let token = TimerToken::new(TimerKind::LongPress(endpoint), epoch);
                state.long_press_timer = Some(scheduler.schedule(timing.long_press, token));
            }
            (PressPhase::ArmedLong, ButtonEdge::Up) => {
                if let Some(handle) = state.long_press_timer.take() {
                    scheduler.cancel(handle);
                }
                state.pending_clicks = state.pending_clicks.saturating_add(1);
                state.pressed_at = None;
                state.phase = PressPhase::ArmedSingle;
                state.epoch = epoch;
                let token = TimerToken::new(TimerKind::ClickSettle(endpoint), epoch);
                state.click_timer = Some(scheduler.schedule(timing.click_settle, token));
            }
            (PressPhase::ArmedSingle, ButtonEdge::Down) => {
                if let Some(handle) = state.click_timer.take() {
                    scheduler.cancel(handle);
                }
                state.pressed_at = Some(now);
                state.phase = PressPhase::ArmedDouble;
                state.epoch = epoch;
                let token = TimerToken::new(TimerKind::LongPress(endpoint), epoch);
                state.long_press_timer = Some(scheduler.schedule(timing.long_press, token));
            }
            (PressPhase::ArmedDouble, ButtonEdge::Up) => {
                if let Some(handle) = state.long_press_timer.take() {
                    scheduler.cancel(handle);
                }
                state.pending_clicks = 0;
                state.pressed_at = None;
                state.phase = PressPhase::Idle;
                state.epoch = epoch;
                emitted = Some(PressEvent::new(endpoint, PressKind::Double));
            }
            (PressPhase::Idle, ButtonEdge::Up) if state.suppress_release => {
                state.suppress_release = false;
                tracing::debug!(%endpoint, "Release after long press suppressed");
            }
            (phase, edge) => {
                tracing::trace!(%endpoint, ?phase, ?edge, "Ignoring edge");
                return None;
            }
        }

        state.last_edge_at = Some(now);
        tracing::debug!(%endpoint, ?edge, phase = ?state.phase, epoch, "Press transition");
        self.next_epoch += 1;

        if let Some(event) = emitted {
            tracing::debug!(%event, "Press classified");
        }
        emitted
    }

    /// Handles a fired press timer.
    ///
    /// Tokens armed under an older epoch, for an unknown endpoint, or for
    /// a non-press timer are ignored.
    pub fn on_timer(&mut self, token: TimerToken) -> Option<PressEvent> {
        if self.torn_down {
            return None;
        }

        let (endpoint, is_long) = match token.kind {
            TimerKind::LongPress(ep) => (ep, true),
            TimerKind::ClickSettle(ep) => (ep, false),
            TimerKind::TransactionSweep | TimerKind::Reassembly => return None,
        };
        let Some(state) = self.endpoints.get_mut(&endpoint) else {
            return None;
        };
        if state.epoch != token.epoch {
            tracing::trace!(
                %endpoint,
                token_epoch = token.epoch,
                epoch = state.epoch,
                "Ignoring stale press timer"
            );
            return None;
        }

        let kind = match (is_long, state.phase) {
            (true, PressPhase::ArmedLong | PressPhase::ArmedDouble) => {
                state.long_press_timer = None;
                state.suppress_release = true;
                PressKind::Long
            }
            (false, PressPhase::ArmedSingle) => {
                state.click_timer = None;
                PressKind::Single
            }
            _ => return None,
        };

        state.pending_clicks = 0;
        state.pressed_at = None;
        state.phase = PressPhase::Idle;
        state.epoch = self.next_epoch;
        self.next_epoch += 1;

        let event = PressEvent::new(endpoint, kind);
        tracing::debug!(%event, "Press classified");
        Some(event)
    }

    /// Accepts a press the device already classified.
    ///
    /// Any local cycle on that endpoint is abandoned and its timer
    /// cancelled.
    pub fn on_classified<S>(&mut self, event: PressEvent, scheduler: &mut S) -> Option<PressEvent>
    where
        S: Scheduler + ?Sized,
    {
        if self.torn_down {
            return None;
        }
        if let Some(state) = self.endpoints.get_mut(&event.endpoint) {
            cancel_timers(state, scheduler);
            state.pending_clicks = 0;
            state.pressed_at = None;
            state.suppress_release = false;
            state.phase = PressPhase::Idle;
            state.epoch = self.next_epoch;
            self.next_epoch += 1;
        }
        tracing::debug!(%event, "Device classified press");
        Some(event)
    }

    /// Cancels every armed timer and drops all endpoint state.
    ///
    /// After teardown the tracker ignores every input. Calling it twice is
    /// harmless.
    pub fn teardown<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        for state in self.endpoints.values_mut() {
            cancel_timers(state, scheduler);
        }
        self.endpoints.clear();
        self.torn_down = true;
    }
}

fn cancel_timers<S: Scheduler + ?Sized>(state: &mut ButtonPressState, scheduler: &mut S) {
    if let Some(handle) = state.click_timer.take() {
        scheduler.cancel(handle);
    }
    if let Some(handle) = state.long_press_timer.take() {
        scheduler.cancel(handle);
    }
}
