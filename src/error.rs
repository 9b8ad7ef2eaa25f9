// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `meshdp` library.
//!
//! This module provides the error hierarchy used across the library:
//! wire decoding and encoding, transaction bookkeeping, capability table
//! configuration, and device session lifecycle.
//!
//! None of these errors is fatal to the process. Decode errors are
//! recoverable by construction (the wire format is length-prefixed), and
//! every device session owns its own state, so a failure on one device
//! never touches another.

use thiserror::Error;

use crate::types::DpType;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A data-point record or frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A data-point record or frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// A transaction could not be registered.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// The capability table is invalid or incomplete.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The device session rejected the operation.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Errors raised while decoding data-point records and frames.
///
/// `Truncated` means "not enough bytes yet": the caller keeps the buffer and
/// retries once the next packet arrives. Every other variant is raised only
/// after the full record is available, so the caller can skip it by its
/// declared length and resume at the next offset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before the record (or frame header) is complete.
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated {
        /// Total bytes required to finish the current unit.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A boolean payload held something other than 0 or 1.
    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),

    /// The type tag does not name a known data-point type.
    #[error("unknown data-point type tag 0x{0:02x}")]
    UnknownType(u8),

    /// The declared payload length is not valid for the data-point type.
    #[error("invalid length {len} for {dp_type} payload")]
    InvalidLength {
        /// The declared type of the record.
        dp_type: DpType,
        /// The declared payload length.
        len: usize,
    },

    /// A string payload is not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// The frame command byte is not a known command.
    #[error("unknown frame command 0x{0:02x}")]
    UnknownCommand(u8),

    /// The reassembly buffer grew past its limit without completing a frame.
    #[error("reassembly buffer overflow at {0} bytes")]
    Oversized(usize),
}

impl DecodeError {
    /// Returns true if more bytes may complete the input.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// Errors raised while encoding data-point records and frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The value variant does not match the declared type.
    #[error("value of type {actual} does not match declared type {declared}")]
    TypeMismatch {
        /// The type tag the data point declares.
        declared: DpType,
        /// The type the value actually carries.
        actual: DpType,
    },

    /// The payload does not fit the 16-bit length field.
    #[error("payload of {0} bytes exceeds the 65535 byte limit")]
    PayloadTooLarge(usize),
}

/// Errors related to transaction registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// A transaction with this sequence number is still in flight.
    #[error("sequence {0} already has a pending transaction")]
    SequenceInUse(u16),

    /// Only command frames can be tracked.
    #[error("only command frames can be tracked, got {0}")]
    NotACommand(crate::protocol::FrameKind),
}

/// Errors related to the capability table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The table JSON could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The same family id appears twice.
    #[error("duplicate device family: {0}")]
    DuplicateFamily(String),

    /// The requested family is not in the table.
    #[error("unknown device family: {0}")]
    UnknownFamily(String),

    /// A family entry is structurally invalid.
    #[error("invalid family {family}: {message}")]
    InvalidFamily {
        /// The offending family id.
        family: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Errors related to the device session lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The operation requires an initialized session.
    #[error("device session is not initialized")]
    NotInitialized,

    /// Initialization runs exactly once per session.
    #[error("device session is already initialized")]
    AlreadyInitialized,

    /// The session was torn down.
    #[error("device session was torn down")]
    TornDown,

    /// The device does not expose the requested capability.
    #[error("capability {0} is not enabled on this device")]
    CapabilityDisabled(String),

    /// No data point accepts writes for the capability and value given.
    #[error("capability {0} cannot be written")]
    NotWritable(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
