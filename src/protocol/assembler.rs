// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reassembly of frames split across radio packets.
//!
//! Packets are appended to a buffer until the buffer parses as a complete
//! frame. A frame is complete once every record it declares is fully
//! present. A record that is complete but malformed is skipped by its
//! declared length and reported alongside the frame, so one bad record
//! never hides the valid records around it.
//!
//! Frames carry no overall length, so a packet boundary that falls exactly
//! between two records reads as a complete frame. Transports split frames
//! inside records, never on record boundaries.
//!
//! The assembler has no clock. A partial frame waits until the owner calls
//! [`FrameAssembler::clear`]; device sessions do so once the continuation is
//! overdue, so a lost packet costs one frame rather than every later one.

use super::codec::{self, RECORD_HEADER_LEN};
use super::frame::{self, FRAME_HEADER_LEN, Frame};
use crate::error::DecodeError;

/// Upper bound on buffered bytes before the assembler gives up on a frame.
pub const MAX_FRAME_LEN: usize = 4096;

/// A record that was dropped while assembling a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Byte offset of the record inside the frame.
    pub offset: usize,
    /// Data-point id byte of the record.
    pub dp_id: u8,
    /// Why the record was dropped.
    pub error: DecodeError,
}

/// A complete frame plus any records dropped from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    /// The frame with every valid record.
    pub frame: Frame,
    /// Records that were complete but malformed.
    pub skipped: Vec<SkippedRecord>,
}

impl AssembledFrame {
    /// Returns true if no record was dropped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Buffers packet fragments until a frame completes.
///
/// # Examples
///
/// ```
/// use meshdp_lib::protocol::{Frame, FrameAssembler};
/// use meshdp_lib::types::DataPoint;
///
/// let bytes = Frame::report(1, vec![DataPoint::value(2, 42)]).encode().unwrap();
/// let mut assembler = FrameAssembler::new();
///
/// assert!(assembler.push(&bytes[..5]).unwrap().is_none());
/// assert!(assembler.is_pending());
///
/// let done = assembler.push(&bytes[5..]).unwrap().unwrap();
/// assert_eq!(done.frame.datapoints, vec![DataPoint::value(2, 42)]);
/// assert!(!assembler.is_pending());
/// ```
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a partial frame is buffered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Appends a packet and returns the frame if it is now complete.
    ///
    /// `Ok(None)` means more bytes are needed. On success or error the
    /// buffer is reset; only `Ok(None)` keeps it.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnknownCommand`] if the header names no known
    ///   command.
    /// - [`DecodeError::Oversized`] if the buffer grows past
    ///   [`MAX_FRAME_LEN`] without completing.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<AssembledFrame>, DecodeError> {
        self.buffer.extend_from_slice(packet);

        match parse(&self.buffer) {
            Ok(Some(assembled)) => {
                self.buffer.clear();
                Ok(Some(assembled))
            }
            Ok(None) if self.buffer.len() > MAX_FRAME_LEN => {
                let size = self.buffer.len();
                self.buffer.clear();
                Err(DecodeError::Oversized(size))
            }
            Ok(None) => {
                tracing::trace!(buffered = self.buffer.len(), "Awaiting more frame bytes");
                Ok(None)
            }
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }
}

fn parse(bytes: &[u8]) -> Result<Option<AssembledFrame>, DecodeError> {
    let (kind, sequence) = match frame::decode_header(bytes) {
        Ok(header) => header,
        Err(e) if e.is_truncated() => return Ok(None),
        Err(e) => return Err(e),
    };

    if !kind.carries_records() {
        return Ok(Some(AssembledFrame {
            frame: Frame::new(kind, sequence, Vec::new()),
            skipped: Vec::new(),
        }));
    }

    let mut datapoints = Vec::new();
    let mut skipped = Vec::new();
    let mut offset = FRAME_HEADER_LEN;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        match codec::decode(rest) {
            Ok((dp, used)) => {
                datapoints.push(dp);
                offset += used;
            }
            Err(e) if e.is_truncated() => return Ok(None),
            Err(error) => {
                // Every non-truncated error leaves a complete record behind.
                let used = codec::record_len(rest).unwrap_or(RECORD_HEADER_LEN);
                skipped.push(SkippedRecord {
                    offset,
                    dp_id: rest[0],
                    error,
                });
                offset += used;
            }
        }
    }

    Ok(Some(AssembledFrame {
        frame: Frame::new(kind, sequence, datapoints),
        skipped,
    }))
}
