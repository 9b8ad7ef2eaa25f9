// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::TransactionConfig;
use crate::error::TransactionError;
use crate::protocol::{Frame, FrameKind};
use crate::types::Timestamp;

/// Opaque identifier of an issued command.
///
/// Ids are unique per tracker and never reused, unlike sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// A command waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Tracker-assigned id.
    pub id: TransactionId,
    /// Sequence number shared with the expected response.
    pub sequence: u16,
    /// When the command was first sent.
    pub issued_at: Timestamp,
    /// When the current attempt times out.
    pub deadline: Timestamp,
    /// Retransmissions left before the transaction fails.
    pub retries_remaining: u8,
    /// The command, kept for retransmission.
    pub frame: Frame,
}

/// A command that exhausted its retries without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFailed {
    /// Tracker-assigned id.
    pub id: TransactionId,
    /// Sequence number of the command.
    pub sequence: u16,
    /// Total sends, the first one included.
    pub attempts: u16,
}

/// What a sweep wants the caller to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Frames to send again, unchanged.
    pub retransmit: Vec<Frame>,
    /// Transactions dropped after their last attempt.
    pub failed: Vec<TransactionFailed>,
}

impl SweepOutcome {
    /// Returns true if the sweep found nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retransmit.is_empty() && self.failed.is_empty()
    }
}

/// Tracks in-flight commands for one device.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use meshdp_lib::protocol::Frame;
/// use meshdp_lib::transaction::{TransactionConfig, TransactionTracker};
/// use meshdp_lib::types::{DataPoint, Timestamp};
///
/// let mut tracker = TransactionTracker::new(TransactionConfig::default());
/// let frame = Frame::command(7, vec![DataPoint::bool(1, true)]);
/// let id = tracker.issue(frame, Timestamp::ZERO).unwrap();
///
/// assert_eq!(tracker.next_deadline(), Some(Timestamp::from_millis(3_000)));
/// assert_eq!(tracker.on_response(7), Some(id));
/// assert_eq!(tracker.on_response(7), None);
/// assert!(tracker.is_empty());
/// ```
#[derive(Debug)]
pub struct TransactionTracker {
    config: TransactionConfig,
    pending: BTreeMap<u16, PendingTransaction>,
    next_id: u64,
}

impl TransactionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new(config: TransactionConfig) -> Self {
        Self {
            config,
            pending: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Returns the tracker configuration.
    #[must_use]
    pub const fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Registers a command that was just sent.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::NotACommand`] if the frame is not a command.
    /// - [`TransactionError::SequenceInUse`] if a command with the same
    ///   sequence is still pending.
    pub fn issue(&mut self, frame: Frame, now: Timestamp) -> Result<TransactionId, TransactionError> {
        if frame.kind != FrameKind::Command {
            return Err(TransactionError::NotACommand(frame.kind));
        }
        if self.pending.contains_key(&frame.sequence) {
            return Err(TransactionError::SequenceInUse(frame.sequence));
        }

        let id = TransactionId(self.next_id);
        self.next_id += 1;

        let sequence = frame.sequence;
        let deadline = now + self.config.timeout;
        self.pending.insert(
            sequence,
            PendingTransaction {
                id,
                sequence,
                issued_at: now,
                deadline,
                retries_remaining: self.config.retries,
                frame,
            },
        );

        tracing::debug!(%id, sequence, %deadline, "Transaction issued");
        Ok(id)
    }

    /// Matches a response and removes its transaction.
    ///
    /// Returns `None` for a response with no pending command, which happens
    /// for duplicates and for answers that arrive after the last retry.
    pub fn on_response(&mut self, sequence: u16) -> Option<TransactionId> {
        if let Some(tx) = self.pending.remove(&sequence) {
            tracing::debug!(id = %tx.id, sequence, "Transaction completed");
            Some(tx.id)
        } else {
            tracing::warn!(sequence, "Response matches no pending transaction");
            None
        }
    }

    /// Retransmits or fails every transaction whose deadline is at or before
    /// `now`.
    ///
    /// A retransmission restarts the timeout from `now`, so with the default
    /// configuration a silent device sees sends at `t`, `t + 3s` and
    /// `t + 6s`, and the transaction fails at `t + 9s`.
    pub fn sweep(&mut self, now: Timestamp) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let timeout = self.config.timeout;
        let attempts = self.config.total_attempts();

        self.pending.retain(|&sequence, tx| {
            if tx.deadline > now {
                return true;
            }
            if tx.retries_remaining > 0 {
                tx.retries_remaining -= 1;
                tx.deadline = now + timeout;
                tracing::debug!(
                    id = %tx.id,
                    sequence,
                    retries_remaining = tx.retries_remaining,
                    "Retransmitting command"
                );
                outcome.retransmit.push(tx.frame.clone());
                true
            } else {
                tracing::warn!(id = %tx.id, sequence, attempts, "Transaction failed");
                outcome.failed.push(TransactionFailed {
                    id: tx.id,
                    sequence,
                    attempts,
                });
                false
            }
        });

        outcome
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.pending.values().map(|tx| tx.deadline).min()
    }

    /// Returns the pending transaction for a sequence.
    #[must_use]
    pub fn get(&self, sequence: u16) -> Option<&PendingTransaction> {
        self.pending.get(&sequence)
    }

    /// Returns true if a command with this sequence is pending.
    #[must_use]
    pub fn contains(&self, sequence: u16) -> bool {
        self.pending.contains_key(&sequence)
    }

    /// Returns the number of pending transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending transaction without reporting them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
