// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time synchronization replies.
//!
//! Devices with a local clock periodically send a time sync request. The
//! reply echoes the request's sequence and carries two big-endian 32-bit
//! second counts: UTC epoch seconds, then local epoch seconds.

use chrono::{DateTime, FixedOffset, Utc};

use super::frame::FrameKind;

/// Length of an encoded time sync reply.
pub const TIME_SYNC_REPLY_LEN: usize = 3 + 8;

/// Builds the time sync reply for a request.
///
/// Times before the epoch clamp to zero and times past 2106 clamp to
/// `u32::MAX`.
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, TimeZone, Utc};
/// use meshdp_lib::protocol::encode_time_sync_reply;
///
/// let utc = Utc.timestamp_opt(1_000, 0).unwrap();
/// let offset = FixedOffset::east_opt(3600).unwrap();
/// let bytes = encode_time_sync_reply(0x0010, utc, offset);
/// assert_eq!(
///     bytes,
///     [0x24, 0x00, 0x10, 0, 0, 0x03, 0xe8, 0, 0, 0x11, 0xf8]
/// );
/// ```
#[must_use]
pub fn encode_time_sync_reply(
    sequence: u16,
    utc: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<u8> {
    let utc_secs = utc.timestamp();
    let local_secs = utc_secs + i64::from(offset.local_minus_utc());

    let mut out = Vec::with_capacity(TIME_SYNC_REPLY_LEN);
    out.push(FrameKind::TimeSync.command_id());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&clamp_secs(utc_secs).to_be_bytes());
    out.extend_from_slice(&clamp_secs(local_secs).to_be_bytes());
    out
}

fn clamp_secs(secs: i64) -> u32 {
    u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
}
