// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::host::TimerHandle;
use crate::types::Timestamp;

/// Where an endpoint is in its press cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressPhase {
    /// No press in progress.
    #[default]
    Idle,
    /// First press held, long-press timer armed.
    ArmedLong,
    /// First press released, click-settle timer armed.
    ArmedSingle,
    /// Second press held, long-press timer armed.
    ArmedDouble,
}

/// Press state of one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonPressState {
    /// Current phase.
    pub phase: PressPhase,
    /// Clicks counted in the current cycle.
    pub pending_clicks: u8,
    /// Armed click-settle timer.
    pub click_timer: Option<TimerHandle>,
    /// Armed long-press timer.
    pub long_press_timer: Option<TimerHandle>,
    /// When the button went down, while it is held.
    pub pressed_at: Option<Timestamp>,
    /// Time of the last accepted edge.
    pub last_edge_at: Option<Timestamp>,
    /// The next release belongs to a press that already fired as long.
    pub suppress_release: bool,
    /// Epoch the armed timer belongs to.
    pub epoch: u64,
}

impl ButtonPressState {
    /// Returns true if the button is currently held.
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        matches!(self.phase, PressPhase::ArmedLong | PressPhase::ArmedDouble)
    }

    /// Returns the armed timer, if any.
    #[must_use]
    pub const fn armed_timer(&self) -> Option<TimerHandle> {
        match (self.click_timer, self.long_press_timer) {
            (Some(handle), _) | (None, Some(handle)) => Some(handle),
            (None, None) => None,
        }
    }
}
