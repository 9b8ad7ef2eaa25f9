// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Allocates 16-bit frame sequence numbers, wrapping after `u16::MAX`.
///
/// # Examples
///
/// ```
/// use meshdp_lib::protocol::SequenceCounter;
///
/// let mut seq = SequenceCounter::new();
/// assert_eq!(seq.next_sequence(), 0);
/// assert_eq!(seq.next_sequence(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next sequence number.
    pub const fn next_sequence(&mut self) -> u16 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }
}
