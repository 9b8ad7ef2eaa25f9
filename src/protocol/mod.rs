// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocol of the vendor data-point cluster.
//!
//! This module is pure: it converts between bytes and typed values and
//! keeps no device state beyond a reassembly buffer.
//!
//! # Building Blocks
//!
//! - [`encode`] / [`decode`]: a single `[id][type][len][payload]` record
//! - [`Frame`]: command byte, 16-bit sequence and a list of records
//! - [`FrameAssembler`]: joins frames split across radio packets and skips
//!   malformed records by their declared length
//! - [`SequenceCounter`]: wrapping sequence allocation for outgoing commands
//! - [`encode_time_sync_reply`]: answer to a device clock request

mod assembler;
mod codec;
mod frame;
mod sequence;
mod time_sync;

pub use assembler::{AssembledFrame, FrameAssembler, MAX_FRAME_LEN, SkippedRecord};
pub use codec::{RECORD_HEADER_LEN, decode, decode_all, encode, encode_into, record_len};
pub use frame::{FRAME_HEADER_LEN, Frame, FrameKind};
pub use sequence::SequenceCounter;
pub use time_sync::{TIME_SYNC_REPLY_LEN, encode_time_sync_reply};
