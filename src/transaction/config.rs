// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

/// Timeout and retry budget of outbound commands.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use meshdp_lib::transaction::TransactionConfig;
///
/// let config = TransactionConfig::default();
/// assert_eq!(config.timeout, Duration::from_secs(3));
/// assert_eq!(config.retries, 2);
/// assert_eq!(config.total_attempts(), 3);
///
/// let patient = TransactionConfig::new()
///     .with_timeout(Duration::from_secs(10))
///     .with_retries(0);
/// assert_eq!(patient.total_attempts(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Time to wait for a response before retransmitting.
    pub timeout: Duration,
    /// Retransmissions after the first send.
    pub retries: u8,
}

impl TransactionConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of retransmissions.
    #[must_use]
    pub const fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    /// Returns the number of sends before a transaction fails.
    #[must_use]
    pub const fn total_attempts(&self) -> u16 {
        self.retries as u16 + 1
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retries: 2,
        }
    }
}
