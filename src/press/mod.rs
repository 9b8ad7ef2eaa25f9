// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Button press classification.
//!
//! Raw contact edges are turned into single, double and long presses, one
//! state machine per button endpoint:
//!
//! ```text
//!            down                  up                  (settle fires)
//!   Idle ─────────▶ ArmedLong ─────────▶ ArmedSingle ─────────────────▶ Single
//!                      │                     │ down
//!                      │ (long fires)        ▼           up
//!                      └──────▶ Long    ArmedDouble ─────────▶ Double
//!                                            │ (long fires)
//!                                            └──────▶ Long
//! ```
//!
//! A long press discards any clicks counted in its cycle, and the release
//! that follows it produces nothing.
//!
//! Only one timer is armed per endpoint at any time. Every transition moves
//! the endpoint to a fresh epoch, and a timer token armed under an older
//! epoch is ignored when it fires.

mod state;
mod tracker;

pub use state::{ButtonPressState, PressPhase};
pub use tracker::PressTracker;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Endpoint;

/// Classification of a completed press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressKind {
    /// One short press.
    Single,
    /// Two short presses within the settle window.
    Double,
    /// A press held past the long-press threshold.
    Long,
}

impl fmt::Display for PressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::Long => "long",
        })
    }
}

/// A raw contact transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonEdge {
    /// Contact closed.
    Down,
    /// Contact opened.
    Up,
}

/// A classified press on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PressEvent {
    /// Button endpoint.
    pub endpoint: Endpoint,
    /// Press classification.
    pub kind: PressKind,
}

impl PressEvent {
    /// Creates a press event.
    #[must_use]
    pub const fn new(endpoint: Endpoint, kind: PressKind) -> Self {
        Self { endpoint, kind }
    }
}

impl fmt::Display for PressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} press on {}", self.kind, self.endpoint)
    }
}

/// Timing thresholds of the press state machine.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use meshdp_lib::press::PressTiming;
///
/// let timing = PressTiming::default();
/// assert_eq!(timing.long_press, Duration::from_millis(800));
/// assert_eq!(timing.click_settle, Duration::from_millis(300));
///
/// let sluggish = PressTiming::new().with_long_press(Duration::from_secs(1));
/// assert_eq!(sluggish.long_press, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressTiming {
    /// Hold time after which a press counts as long.
    pub long_press: Duration,
    /// Quiet time after a release before a single press is reported.
    pub click_settle: Duration,
    /// Edges closer than this to the previous accepted edge are bounce.
    pub debounce: Duration,
}

impl PressTiming {
    /// Creates timing with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the long-press threshold.
    #[must_use]
    pub const fn with_long_press(mut self, long_press: Duration) -> Self {
        self.long_press = long_press;
        self
    }

    /// Sets the click-settle window.
    #[must_use]
    pub const fn with_click_settle(mut self, click_settle: Duration) -> Self {
        self.click_settle = click_settle;
        self
    }

    /// Sets the debounce interval. Zero disables debouncing.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for PressTiming {
    fn default() -> Self {
        Self {
            long_press: Duration::from_millis(800),
            click_settle: Duration::from_millis(300),
            debounce: Duration::from_millis(30),
        }
    }
}
