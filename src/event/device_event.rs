// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use serde::{Deserialize, Serialize};

use crate::datapoints::CapabilityValue;
use crate::press::PressEvent;
use crate::transaction::{TransactionFailed, TransactionId};
use crate::types::PowerProfile;

use super::DeviceId;

/// Events a device session publishes to its host.
///
/// Every event carries the id of the session that produced it.
///
/// # Examples
///
/// ```
/// use meshdp_lib::datapoints::CapabilityValue;
/// use meshdp_lib::event::{DeviceEvent, DeviceId};
///
/// let device_id = DeviceId::new();
/// let event = DeviceEvent::capability_changed(
///     device_id,
///     "measure_temperature",
///     CapabilityValue::Number(21.5),
/// );
/// assert_eq!(event.device_id(), device_id);
/// assert!(event.is_value_update());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Power detection and capability resolution completed.
    Initialized {
        /// The device.
        device_id: DeviceId,
        /// Detected power profile.
        profile: PowerProfile,
        /// Capabilities that were registered.
        enabled: Vec<String>,
    },

    /// A reported data point produced a new capability value.
    CapabilityChanged {
        /// The device.
        device_id: DeviceId,
        /// Capability name.
        capability: String,
        /// New value.
        value: CapabilityValue,
    },

    /// A button press was classified.
    ButtonPressed {
        /// The device.
        device_id: DeviceId,
        /// Endpoint and classification.
        press: PressEvent,
    },

    /// A command was acknowledged.
    TransactionCompleted {
        /// The device.
        device_id: DeviceId,
        /// The acknowledged command.
        id: TransactionId,
        /// Its sequence number.
        sequence: u16,
    },

    /// A command exhausted its retries.
    TransactionFailed {
        /// The device.
        device_id: DeviceId,
        /// The failed command.
        failure: TransactionFailed,
    },

    /// Too many consecutive malformed frames or records.
    DecodeFailuresEscalated {
        /// The device.
        device_id: DeviceId,
        /// Consecutive failures that triggered the escalation.
        count: u32,
    },

    /// The session was torn down and will publish nothing further.
    TornDown {
        /// The device.
        device_id: DeviceId,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::Initialized { device_id, .. }
            | Self::CapabilityChanged { device_id, .. }
            | Self::ButtonPressed { device_id, .. }
            | Self::TransactionCompleted { device_id, .. }
            | Self::TransactionFailed { device_id, .. }
            | Self::DecodeFailuresEscalated { device_id, .. }
            | Self::TornDown { device_id } => *device_id,
        }
    }

    /// Returns `true` for capability value updates.
    #[must_use]
    pub fn is_value_update(&self) -> bool {
        matches!(self, Self::CapabilityChanged { .. })
    }

    /// Returns `true` for failures the host may want to act on.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed { .. } | Self::DecodeFailuresEscalated { .. }
        )
    }

    /// Creates a capability changed event.
    #[must_use]
    pub fn capability_changed(
        device_id: DeviceId,
        capability: impl Into<String>,
        value: CapabilityValue,
    ) -> Self {
        Self::CapabilityChanged {
            device_id,
            capability: capability.into(),
            value,
        }
    }

    /// Creates a button pressed event.
    #[must_use]
    pub fn button_pressed(device_id: DeviceId, press: PressEvent) -> Self {
        Self::ButtonPressed { device_id, press }
    }
}
