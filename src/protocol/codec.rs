// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary codec for single data-point records.
//!
//! # Record Layout
//!
//! ```text
//! +------+----------+--------+--------+-----------------+
//! |  id  | type tag | len hi | len lo | payload (len B) |
//! +------+----------+--------+--------+-----------------+
//! ```
//!
//! The length is big-endian and covers the payload only. Payload rules:
//!
//! | Type   | Payload                                   |
//! |--------|-------------------------------------------|
//! | Raw    | any length                                |
//! | Bool   | exactly 1 byte, 0 or 1                    |
//! | Value  | exactly 4 bytes, big-endian signed        |
//! | String | UTF-8, any length                         |
//! | Enum   | exactly 1 byte                            |
//! | Bitmap | 1, 2 or 4 bytes, big-endian               |
//!
//! Decoding never reads past the buffer: a record whose declared length
//! exceeds the remaining bytes fails with [`DecodeError::Truncated`], and
//! the caller retries once more bytes arrive.

use crate::error::{DecodeError, EncodeError};
use crate::types::{Bitmap, DataPoint, DpType, DpValue};

/// Size of the record header (id, type tag, 16-bit length).
pub const RECORD_HEADER_LEN: usize = 4;

/// Encodes one data point into a new buffer.
///
/// # Errors
///
/// Returns [`EncodeError::TypeMismatch`] if the value variant does not match
/// the declared type, or [`EncodeError::PayloadTooLarge`] if the payload does
/// not fit the 16-bit length field.
///
/// # Examples
///
/// ```
/// use meshdp_lib::protocol::encode;
/// use meshdp_lib::types::DataPoint;
///
/// let bytes = encode(&DataPoint::value(2, 300)).unwrap();
/// assert_eq!(bytes, [0x02, 0x02, 0x00, 0x04, 0x00, 0x00, 0x01, 0x2c]);
/// ```
pub fn encode(dp: &DataPoint) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(RECORD_HEADER_LEN + 4);
    encode_into(dp, &mut out)?;
    Ok(out)
}

/// Appends one encoded data point to `out`.
///
/// On error nothing is appended.
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_into(dp: &DataPoint, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let actual = dp.value.dp_type();
    if actual != dp.dp_type {
        return Err(EncodeError::TypeMismatch {
            declared: dp.dp_type,
            actual,
        });
    }

    let payload: Vec<u8> = match &dp.value {
        DpValue::Raw(bytes) => bytes.clone(),
        DpValue::Bool(b) => vec![u8::from(*b)],
        DpValue::Value(v) => v.to_be_bytes().to_vec(),
        DpValue::String(s) => s.as_bytes().to_vec(),
        DpValue::Enum(e) => vec![*e],
        DpValue::Bitmap(Bitmap::U8(v)) => vec![*v],
        DpValue::Bitmap(Bitmap::U16(v)) => v.to_be_bytes().to_vec(),
        DpValue::Bitmap(Bitmap::U32(v)) => v.to_be_bytes().to_vec(),
    };

    let len = u16::try_from(payload.len()).map_err(|_| EncodeError::PayloadTooLarge(payload.len()))?;

    out.reserve(RECORD_HEADER_LEN + payload.len());
    out.push(dp.id);
    out.push(dp.dp_type.tag());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

/// Decodes exactly one data-point record from the front of `bytes`.
///
/// Returns the data point and the number of bytes consumed, so a buffer of
/// concatenated records can be walked by advancing the offset.
///
/// # Errors
///
/// - [`DecodeError::Truncated`] if the header or the declared payload is
///   not fully present.
/// - [`DecodeError::UnknownType`], [`DecodeError::InvalidBool`],
///   [`DecodeError::InvalidLength`], [`DecodeError::InvalidUtf8`] for a
///   complete but malformed record. These are only raised once the whole
///   record is available, so the caller may skip it with
///   [`record_len`] and resume.
///
/// # Examples
///
/// ```
/// use meshdp_lib::protocol::decode;
/// use meshdp_lib::types::DataPoint;
///
/// let bytes = [0x01, 0x01, 0x00, 0x01, 0x01, /* next record */ 0x04];
/// let (dp, used) = decode(&bytes).unwrap();
/// assert_eq!(dp, DataPoint::bool(1, true));
/// assert_eq!(used, 5);
/// ```
pub fn decode(bytes: &[u8]) -> Result<(DataPoint, usize), DecodeError> {
    let total = record_len(bytes)?;
    let id = bytes[0];
    let dp_type = DpType::try_from(bytes[1])?;
    let payload = &bytes[RECORD_HEADER_LEN..total];

    let value = decode_payload(dp_type, payload)?;
    tracing::trace!(dp = id, %dp_type, len = payload.len(), "Decoded data-point record");

    Ok((DataPoint { id, dp_type, value }, total))
}

/// Decodes every record in `bytes`, which must hold only whole records.
///
/// # Errors
///
/// Returns the first error met, including [`DecodeError::Truncated`] if the
/// last record is incomplete.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<DataPoint>, DecodeError> {
    let mut offset = 0;
    let mut out = Vec::new();
    while offset < bytes.len() {
        let (dp, used) = decode(&bytes[offset..])?;
        out.push(dp);
        offset += used;
    }
    Ok(out)
}

/// Returns the total size (header plus payload) of the record at the front
/// of `bytes`.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if the header or payload is incomplete.
pub fn record_len(bytes: &[u8]) -> Result<usize, DecodeError> {
    if bytes.len() < RECORD_HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: RECORD_HEADER_LEN,
            available: bytes.len(),
        });
    }
    let len = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
    let total = RECORD_HEADER_LEN + len;
    if bytes.len() < total {
        return Err(DecodeError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }
    Ok(total)
}

fn decode_payload(dp_type: DpType, payload: &[u8]) -> Result<DpValue, DecodeError> {
    let invalid_length = || DecodeError::InvalidLength {
        dp_type,
        len: payload.len(),
    };

    match dp_type {
        DpType::Raw => Ok(DpValue::Raw(payload.to_vec())),
        DpType::Bool => match payload {
            [0] => Ok(DpValue::Bool(false)),
            [1] => Ok(DpValue::Bool(true)),
            [other] => Err(DecodeError::InvalidBool(*other)),
            _ => Err(invalid_length()),
        },
        DpType::Value => {
            let bytes: [u8; 4] = payload.try_into().map_err(|_| invalid_length())?;
            Ok(DpValue::Value(i32::from_be_bytes(bytes)))
        }
        DpType::String => std::str::from_utf8(payload)
            .map(|s| DpValue::String(s.to_owned()))
            .map_err(|_| DecodeError::InvalidUtf8),
        DpType::Enum => match payload {
            [index] => Ok(DpValue::Enum(*index)),
            _ => Err(invalid_length()),
        },
        DpType::Bitmap => match *payload {
            [a] => Ok(DpValue::Bitmap(Bitmap::U8(a))),
            [a, b] => Ok(DpValue::Bitmap(Bitmap::U16(u16::from_be_bytes([a, b])))),
            [a, b, c, d] => Ok(DpValue::Bitmap(Bitmap::U32(u32::from_be_bytes([
                a, b, c, d,
            ])))),
            _ => Err(invalid_length()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<DataPoint> {
        vec![
            DataPoint::raw(36, vec![0x18, 0x0a, 0x11]),
            DataPoint::raw(37, Vec::new()),
            DataPoint::bool(1, true),
            DataPoint::bool(2, false),
            DataPoint::value(3, 0),
            DataPoint::value(4, -1),
            DataPoint::value(5, i32::MAX),
            DataPoint::value(6, i32::MIN),
            DataPoint::string(7, "schedule"),
            DataPoint::string(8, "température"),
            DataPoint::string(9, ""),
            DataPoint::enumeration(10, 2),
            DataPoint::bitmap(11, Bitmap::U8(0x81)),
            DataPoint::bitmap(12, Bitmap::U16(0x0102)),
            DataPoint::bitmap(13, Bitmap::U32(0xdead_beef)),
        ]
    }

    #[test]
    fn encoding_layout_for_each_type() {
        assert_eq!(
            encode(&DataPoint::bool(1, true)).unwrap(),
            [0x01, 0x01, 0x00, 0x01, 0x01]
        );
        assert_eq!(
            encode(&DataPoint::value(2, -2)).unwrap(),
            [0x02, 0x02, 0x00, 0x04, 0xff, 0xff, 0xff, 0xfe]
        );
        assert_eq!(
            encode(&DataPoint::string(3, "ok")).unwrap(),
            [0x03, 0x03, 0x00, 0x02, b'o', b'k']
        );
        assert_eq!(
            encode(&DataPoint::enumeration(4, 1)).unwrap(),
            [0x04, 0x04, 0x00, 0x01, 0x01]
        );
        assert_eq!(
            encode(&DataPoint::bitmap(5, Bitmap::U16(0x0203))).unwrap(),
            [0x05, 0x05, 0x00, 0x02, 0x02, 0x03]
        );
    }

    #[test]
    fn decode_inverts_encode() {
        for dp in samples() {
            let bytes = encode(&dp).unwrap();
            assert_eq!(decode(&bytes), Ok((dp, bytes.len())));
        }
    }

    #[test]
    fn every_strict_prefix_is_truncated() {
        for dp in samples() {
            let bytes = encode(&dp).unwrap();
            for k in 0..bytes.len() {
                let err = decode(&bytes[..k]).unwrap_err();
                assert!(err.is_truncated(), "{dp} prefix {k}: {err:?}");
            }
        }
    }

    #[test]
    fn declared_length_beyond_buffer_is_truncated() {
        // Declares 300 bytes of raw payload but only carries 3.
        let bytes = [0x10, 0x00, 0x01, 0x2c, 1, 2, 3];
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::Truncated {
                needed: 304,
                available: 7
            })
        );
    }

    #[test]
    fn concatenated_records_decode_in_order() {
        let mut buf = Vec::new();
        for dp in samples() {
            encode_into(&dp, &mut buf).unwrap();
        }
        assert_eq!(decode_all(&buf).unwrap(), samples());
    }

    #[test]
    fn bool_rejects_other_bytes() {
        assert_eq!(
            decode(&[0x01, 0x01, 0x00, 0x01, 0x02]),
            Err(DecodeError::InvalidBool(0x02))
        );
    }

    #[test]
    fn unknown_type_is_reported_once_complete() {
        assert_eq!(
            decode(&[0x01, 0x09, 0x00, 0x01, 0x00]),
            Err(DecodeError::UnknownType(0x09))
        );
        // Same record, still missing its payload byte.
        assert!(decode(&[0x01, 0x09, 0x00, 0x01]).unwrap_err().is_truncated());
    }

    #[test]
    fn value_requires_four_bytes() {
        assert_eq!(
            decode(&[0x02, 0x02, 0x00, 0x02, 0x00, 0x01]),
            Err(DecodeError::InvalidLength {
                dp_type: DpType::Value,
                len: 2
            })
        );
    }

    #[test]
    fn bitmap_rejects_three_bytes() {
        assert_eq!(
            decode(&[0x05, 0x05, 0x00, 0x03, 1, 2, 3]),
            Err(DecodeError::InvalidLength {
                dp_type: DpType::Bitmap,
                len: 3
            })
        );
    }

    #[test]
    fn bitmap_decodes_into_smallest_width() {
        let (dp, _) = decode(&[0x05, 0x05, 0x00, 0x01, 0x80]).unwrap();
        assert_eq!(dp.value, DpValue::Bitmap(Bitmap::U8(0x80)));
        let (dp, _) = decode(&[0x05, 0x05, 0x00, 0x04, 0, 0, 1, 0]).unwrap();
        assert_eq!(dp.value, DpValue::Bitmap(Bitmap::U32(0x100)));
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        assert_eq!(
            decode(&[0x03, 0x03, 0x00, 0x02, 0xc3, 0x28]),
            Err(DecodeError::InvalidUtf8)
        );
    }

    #[test]
    fn mismatched_pair_is_rejected_not_coerced() {
        let dp = DataPoint {
            id: 1,
            dp_type: DpType::Bool,
            value: DpValue::Value(1),
        };
        let mut out = vec![0xaa];
        assert_eq!(
            encode_into(&dp, &mut out),
            Err(EncodeError::TypeMismatch {
                declared: DpType::Bool,
                actual: DpType::Value
            })
        );
        assert_eq!(out, [0xaa]);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let dp = DataPoint::raw(1, vec![0; 70_000]);
        assert_eq!(encode(&dp), Err(EncodeError::PayloadTooLarge(70_000)));
    }

    #[test]
    fn record_len_reports_full_size() {
        assert_eq!(record_len(&[0x01, 0x00, 0x00, 0x02, 9, 9, 7]), Ok(6));
    }
}
