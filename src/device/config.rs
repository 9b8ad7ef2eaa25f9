// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-session tuning.

use std::time::Duration;

use crate::press::PressTiming;
use crate::transaction::TransactionConfig;

/// Default number of consecutive decode failures before escalating.
pub const DEFAULT_DECODE_FAILURE_THRESHOLD: u32 = 5;

/// Default time a partial frame may wait for its next packet.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for one device session.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use meshdp_lib::device::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_transaction_timeout(Duration::from_secs(5))
///     .with_long_press(Duration::from_millis(1_000))
///     .with_decode_failure_threshold(10);
///
/// assert_eq!(config.transaction.timeout, Duration::from_secs(5));
/// assert_eq!(config.press.long_press, Duration::from_millis(1_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Command timeout and retry policy.
    pub transaction: TransactionConfig,
    /// Button classification thresholds.
    pub press: PressTiming,
    /// Consecutive malformed frames or records before the host is notified.
    /// Zero disables escalation.
    pub decode_failure_threshold: u32,
    /// How long a partial frame waits for its continuation before it is
    /// discarded.
    pub reassembly_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transaction: TransactionConfig::default(),
            press: PressTiming::default(),
            decode_failure_threshold: DEFAULT_DECODE_FAILURE_THRESHOLD,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transaction policy.
    #[must_use]
    pub const fn with_transaction(mut self, transaction: TransactionConfig) -> Self {
        self.transaction = transaction;
        self
    }

    /// Sets the per-attempt command timeout.
    #[must_use]
    pub const fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction.timeout = timeout;
        self
    }

    /// Sets how many times an unanswered command is resent.
    #[must_use]
    pub const fn with_retries(mut self, retries: u8) -> Self {
        self.transaction.retries = retries;
        self
    }

    /// Sets the press timing.
    #[must_use]
    pub const fn with_press_timing(mut self, press: PressTiming) -> Self {
        self.press = press;
        self
    }

    /// Sets the hold time that makes a press long.
    #[must_use]
    pub const fn with_long_press(mut self, long_press: Duration) -> Self {
        self.press.long_press = long_press;
        self
    }

    /// Sets the decode failure escalation threshold.
    #[must_use]
    pub const fn with_decode_failure_threshold(mut self, threshold: u32) -> Self {
        self.decode_failure_threshold = threshold;
        self
    }

    /// Sets how long a partial frame is kept.
    #[must_use]
    pub const fn with_reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.transaction, TransactionConfig::default());
        assert_eq!(config.press, PressTiming::default());
        assert_eq!(config.decode_failure_threshold, 5);
        assert_eq!(config.reassembly_timeout, Duration::from_secs(2));
    }

    #[test]
    fn builders_touch_only_their_field() {
        let config = SessionConfig::new().with_retries(0);
        assert_eq!(config.transaction.retries, 0);
        assert_eq!(config.transaction.timeout, Duration::from_secs(3));
        assert_eq!(config.press, PressTiming::default());

        let config = SessionConfig::new().with_reassembly_timeout(Duration::from_millis(500));
        assert_eq!(config.reassembly_timeout, Duration::from_millis(500));
        assert_eq!(config.decode_failure_threshold, DEFAULT_DECODE_FAILURE_THRESHOLD);
    }
}
