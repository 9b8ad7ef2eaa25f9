// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor cluster frames.
//!
//! A frame wraps zero or more data-point records behind a three byte
//! header:
//!
//! ```text
//! +---------+--------------+--------------+-----------------+
//! | command | sequence hi  | sequence lo  | records ...     |
//! +---------+--------------+--------------+-----------------+
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::codec::{self, RECORD_HEADER_LEN};
use crate::error::{DecodeError, EncodeError};
use crate::types::DataPoint;

/// Size of the frame header (command byte and 16-bit sequence).
pub const FRAME_HEADER_LEN: usize = 3;

/// Direction and purpose of a frame.
///
/// # Examples
///
/// ```
/// use meshdp_lib::protocol::FrameKind;
///
/// assert_eq!(FrameKind::Report.command_id(), 0x02);
/// assert_eq!(FrameKind::from_command_id(0x01), Some(FrameKind::Response));
/// assert_eq!(FrameKind::from_command_id(0x7f), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Host to device data request.
    Command,
    /// Device answer to a command, echoing its sequence.
    Response,
    /// Unsolicited device report.
    Report,
    /// Device request for the current time.
    TimeSync,
}

impl FrameKind {
    /// Returns the command byte of this kind.
    #[must_use]
    pub const fn command_id(self) -> u8 {
        match self {
            Self::Command => 0x00,
            Self::Response => 0x01,
            Self::Report => 0x02,
            Self::TimeSync => 0x24,
        }
    }

    /// Maps a command byte back to a kind.
    #[must_use]
    pub const fn from_command_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(Self::Command),
            0x01 => Some(Self::Response),
            0x02 => Some(Self::Report),
            0x24 => Some(Self::TimeSync),
            _ => None,
        }
    }

    /// Returns true if frames of this kind carry data-point records.
    #[must_use]
    pub const fn carries_records(self) -> bool {
        !matches!(self, Self::TimeSync)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::Response => "response",
            Self::Report => "report",
            Self::TimeSync => "time_sync",
        })
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Sequence number used to correlate commands and responses.
    pub sequence: u16,
    /// Carried data points, empty for time sync requests.
    pub datapoints: Vec<DataPoint>,
}

impl Frame {
    /// Creates a frame.
    #[must_use]
    pub const fn new(kind: FrameKind, sequence: u16, datapoints: Vec<DataPoint>) -> Self {
        Self {
            kind,
            sequence,
            datapoints,
        }
    }

    /// Creates a command frame.
    #[must_use]
    pub const fn command(sequence: u16, datapoints: Vec<DataPoint>) -> Self {
        Self::new(FrameKind::Command, sequence, datapoints)
    }

    /// Creates a response frame.
    #[must_use]
    pub const fn response(sequence: u16, datapoints: Vec<DataPoint>) -> Self {
        Self::new(FrameKind::Response, sequence, datapoints)
    }

    /// Creates a report frame.
    #[must_use]
    pub const fn report(sequence: u16, datapoints: Vec<DataPoint>) -> Self {
        Self::new(FrameKind::Report, sequence, datapoints)
    }

    /// Encodes the frame to bytes.
    ///
    /// # Errors
    ///
    /// Returns the first [`EncodeError`] raised by a carried data point.
    ///
    /// # Examples
    ///
    /// ```
    /// use meshdp_lib::protocol::Frame;
    /// use meshdp_lib::types::DataPoint;
    ///
    /// let frame = Frame::command(0x0102, vec![DataPoint::bool(1, true)]);
    /// assert_eq!(
    ///     frame.encode().unwrap(),
    ///     [0x00, 0x01, 0x02, 0x01, 0x01, 0x00, 0x01, 0x01]
    /// );
    /// ```
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out =
            Vec::with_capacity(FRAME_HEADER_LEN + self.datapoints.len() * (RECORD_HEADER_LEN + 4));
        out.push(self.kind.command_id());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        for dp in &self.datapoints {
            codec::encode_into(dp, &mut out)?;
        }
        Ok(out)
    }

    /// Decodes a complete frame.
    ///
    /// Every record must be well formed. Time sync requests carry no
    /// records; any bytes after their header are ignored.
    ///
    /// Use [`FrameAssembler`](super::FrameAssembler) for input that may be
    /// split across packets or hold malformed records.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownCommand`] for an unknown command byte,
    /// or the first record [`DecodeError`].
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (kind, sequence) = decode_header(bytes)?;
        let datapoints = if kind.carries_records() {
            codec::decode_all(&bytes[FRAME_HEADER_LEN..])?
        } else {
            Vec::new()
        };
        Ok(Self::new(kind, sequence, datapoints))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} ({} dp)",
            self.kind,
            self.sequence,
            self.datapoints.len()
        )
    }
}

/// Parses the three byte frame header.
pub(crate) fn decode_header(bytes: &[u8]) -> Result<(FrameKind, u16), DecodeError> {
    let [command, hi, lo, ..] = *bytes else {
        return Err(DecodeError::Truncated {
            needed: FRAME_HEADER_LEN,
            available: bytes.len(),
        });
    };
    let kind = FrameKind::from_command_id(command).ok_or(DecodeError::UnknownCommand(command))?;
    Ok((kind, u16::from_be_bytes([hi, lo])))
}
