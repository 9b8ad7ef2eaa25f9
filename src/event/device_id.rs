// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one device session.
///
/// Either random, or derived from the device's 64-bit IEEE address so the
/// same radio always maps to the same id across restarts.
///
/// # Examples
///
/// ```
/// use meshdp_lib::event::DeviceId;
///
/// let a = DeviceId::from_ieee_address(0x00_12_4b_00_1c_aa_bb_cc);
/// let b = DeviceId::from_ieee_address(0x00_12_4b_00_1c_aa_bb_cc);
/// assert_eq!(a, b);
/// assert_ne!(DeviceId::new(), DeviceId::new());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Creates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a stable identifier from a 64-bit IEEE address.
    #[must_use]
    pub const fn from_ieee_address(address: u64) -> Self {
        Self(Uuid::from_u64_pair(0, address))
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.0.simple().to_string();
        write!(f, "DeviceId({}...)", &full[full.len() - 8..])
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DeviceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
