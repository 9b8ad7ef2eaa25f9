// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Correlation of outbound commands with device responses.
//!
//! Every command frame is registered with a [`TransactionTracker`] under its
//! sequence number. A matching response removes it. A periodic sweep
//! retransmits commands whose deadline passed and, once the retry budget is
//! spent, drops them and reports a [`TransactionFailed`].
//!
//! The tracker never reads a clock or arms a timer itself; the caller
//! passes the current [`Timestamp`](crate::types::Timestamp) in and asks
//! [`TransactionTracker::next_deadline`] when to sweep next.

mod config;
mod tracker;

pub use config::TransactionConfig;
pub use tracker::{
    PendingTransaction, SweepOutcome, TransactionFailed, TransactionId, TransactionTracker,
};
