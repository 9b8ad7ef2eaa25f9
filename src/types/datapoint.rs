// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data-point types for the vendor cluster protocol.
//!
//! A data point is a typed `(id, type, value)` unit of application data. The
//! type tag travels on the wire next to the id, and the value must always
//! match that tag: [`DataPoint::new`] derives the tag from the value so the
//! pair cannot disagree, while the public fields still allow building a
//! mismatched pair, which the encoder rejects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Wire type tag of a data point.
///
/// # Examples
///
/// ```
/// use meshdp_lib::types::DpType;
///
/// assert_eq!(DpType::Value.tag(), 0x02);
/// assert_eq!(DpType::try_from(0x05).unwrap(), DpType::Bitmap);
/// assert!(DpType::try_from(0x06).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DpType {
    /// Opaque bytes.
    Raw,
    /// One byte, 0 or 1.
    Bool,
    /// Four bytes, big-endian signed integer.
    Value,
    /// UTF-8 text.
    String,
    /// One byte enumeration index.
    Enum,
    /// 1, 2 or 4 byte big-endian bit field.
    Bitmap,
}

impl DpType {
    /// Returns the wire tag for this type.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Raw => 0x00,
            Self::Bool => 0x01,
            Self::Value => 0x02,
            Self::String => 0x03,
            Self::Enum => 0x04,
            Self::Bitmap => 0x05,
        }
    }

    /// Returns the lowercase name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Bool => "bool",
            Self::Value => "value",
            Self::String => "string",
            Self::Enum => "enum",
            Self::Bitmap => "bitmap",
        }
    }
}

impl TryFrom<u8> for DpType {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x00 => Ok(Self::Raw),
            0x01 => Ok(Self::Bool),
            0x02 => Ok(Self::Value),
            0x03 => Ok(Self::String),
            0x04 => Ok(Self::Enum),
            0x05 => Ok(Self::Bitmap),
            other => Err(DecodeError::UnknownType(other)),
        }
    }
}

impl fmt::Display for DpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bitmap payload, stored in the smallest integer that fits its wire width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bitmap {
    /// One byte bitmap.
    U8(u8),
    /// Two byte bitmap.
    U16(u16),
    /// Four byte bitmap.
    U32(u32),
}

impl Bitmap {
    /// Returns the wire width in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    /// Returns the bits widened to `u32`.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        match *self {
            Self::U8(v) => v as u32,
            Self::U16(v) => v as u32,
            Self::U32(v) => v,
        }
    }

    /// Returns true if bit `index` is set. Bits past the width read as unset.
    #[must_use]
    pub const fn is_set(&self, index: u32) -> bool {
        index < (self.width() as u32) * 8 && self.bits() & (1 << index) != 0
    }
}

/// The value carried by a data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DpValue {
    /// Opaque bytes.
    Raw(Vec<u8>),
    /// Boolean flag.
    Bool(bool),
    /// Signed 32-bit integer.
    Value(i32),
    /// UTF-8 text.
    String(String),
    /// Enumeration index.
    Enum(u8),
    /// Bit field.
    Bitmap(Bitmap),
}

impl DpValue {
    /// Returns the type tag that matches this value.
    #[must_use]
    pub const fn dp_type(&self) -> DpType {
        match self {
            Self::Raw(_) => DpType::Raw,
            Self::Bool(_) => DpType::Bool,
            Self::Value(_) => DpType::Value,
            Self::String(_) => DpType::String,
            Self::Enum(_) => DpType::Enum,
            Self::Bitmap(_) => DpType::Bitmap,
        }
    }

    /// Returns the value as an integer when it has a numeric reading.
    ///
    /// Booleans read as 0/1, enums as their index and bitmaps as their bits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Value(v) => Some(i64::from(*v)),
            Self::Enum(e) => Some(i64::from(*e)),
            Self::Bitmap(b) => Some(i64::from(b.bits())),
            Self::Raw(_) | Self::String(_) => None,
        }
    }
}

/// A typed `(id, type, value)` unit of application data.
///
/// # Examples
///
/// ```
/// use meshdp_lib::types::{DataPoint, DpType, DpValue};
///
/// let dp = DataPoint::value(2, 450);
/// assert_eq!(dp.id, 2);
/// assert_eq!(dp.dp_type, DpType::Value);
/// assert_eq!(dp.value, DpValue::Value(450));
/// assert!(dp.is_consistent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Data-point id.
    pub id: u8,
    /// Declared wire type.
    pub dp_type: DpType,
    /// Carried value.
    pub value: DpValue,
}

impl DataPoint {
    /// Creates a data point whose type tag is derived from the value.
    #[must_use]
    pub fn new(id: u8, value: DpValue) -> Self {
        Self {
            id,
            dp_type: value.dp_type(),
            value,
        }
    }

    /// Creates a raw data point.
    #[must_use]
    pub fn raw(id: u8, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(id, DpValue::Raw(bytes.into()))
    }

    /// Creates a boolean data point.
    #[must_use]
    pub fn bool(id: u8, value: bool) -> Self {
        Self::new(id, DpValue::Bool(value))
    }

    /// Creates an integer data point.
    #[must_use]
    pub fn value(id: u8, value: i32) -> Self {
        Self::new(id, DpValue::Value(value))
    }

    /// Creates a string data point.
    #[must_use]
    pub fn string(id: u8, value: impl Into<String>) -> Self {
        Self::new(id, DpValue::String(value.into()))
    }

    /// Creates an enum data point.
    #[must_use]
    pub fn enumeration(id: u8, index: u8) -> Self {
        Self::new(id, DpValue::Enum(index))
    }

    /// Creates a bitmap data point.
    #[must_use]
    pub fn bitmap(id: u8, bits: Bitmap) -> Self {
        Self::new(id, DpValue::Bitmap(bits))
    }

    /// Returns true if the value variant matches the declared type.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.value.dp_type() == self.dp_type
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DP{}({})", self.id, self.dp_type)
    }
}
