// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device family profiles and capability resolution.
//!
//! A [`FamilyProfile`] lists which capabilities a family of devices exposes
//! and how often they are polled, split by power source. Given a detected
//! [`PowerProfile`], [`FamilyProfile::resolve`] computes the
//! [`CapabilitySet`] to register with the host. Resolution is a pure
//! function and runs once per device session.
//!
//! # Built-in Table
//!
//! [`CapabilityTable::builtin`] covers the common families. A custom table
//! can be loaded with [`CapabilityTable::from_json`]:
//!
//! ```json
//! [
//!   {
//!     "family_id": "switch",
//!     "capabilities": ["onoff"],
//!     "battery_capabilities": ["measure_battery"],
//!     "mains_capabilities": [],
//!     "poll_interval_battery": 3600,
//!     "poll_interval_mains": null
//!   }
//! ]
//! ```
//!
//! Poll intervals are given in seconds.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::datapoints::DpMapping;
use crate::error::ConfigError;
use crate::types::{BatteryChemistry, Endpoint, PowerProfile};

/// Whether a capability is exposed and how often it is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityDecision {
    /// Whether the capability is registered with the host.
    pub enabled: bool,
    /// Poll interval, `None` when the device reports on its own.
    pub poll_interval: Option<Duration>,
}

impl CapabilityDecision {
    /// An enabled capability.
    #[must_use]
    pub const fn enabled(poll_interval: Option<Duration>) -> Self {
        Self {
            enabled: true,
            poll_interval,
        }
    }

    /// A disabled capability.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            poll_interval: None,
        }
    }
}

/// The resolved capabilities of one device.
///
/// Holds a decision for every capability the family knows about, so
/// disabled capabilities can be deregistered from the host.
///
/// # Examples
///
/// ```
/// use meshdp_lib::capabilities::CapabilityTable;
/// use meshdp_lib::types::{BatteryChemistry, PowerProfile};
///
/// let table = CapabilityTable::builtin();
/// let set = table
///     .resolve("switch", PowerProfile::battery(BatteryChemistry::Cr2032))
///     .unwrap();
///
/// assert!(set.is_enabled("onoff"));
/// assert!(set.is_enabled("measure_battery"));
/// assert!(set.poll_interval("onoff").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    decisions: BTreeMap<String, CapabilityDecision>,
}

impl CapabilitySet {
    /// Returns the decision for a capability.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CapabilityDecision> {
        self.decisions.get(name)
    }

    /// Returns true if the capability is enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|d| d.enabled)
    }

    /// Returns the poll interval of an enabled capability.
    #[must_use]
    pub fn poll_interval(&self, name: &str) -> Option<Duration> {
        self.get(name)
            .filter(|d| d.enabled)
            .and_then(|d| d.poll_interval)
    }

    /// Iterates over every decision in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CapabilityDecision)> {
        self.decisions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over enabled capability names.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, d)| d.enabled).map(|(k, _)| k)
    }

    /// Iterates over disabled capability names.
    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, d)| !d.enabled).map(|(k, _)| k)
    }

    /// Returns the number of known capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Capability layout of a device family.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use meshdp_lib::capabilities::FamilyProfile;
/// use meshdp_lib::types::{BatteryChemistry, PowerProfile};
///
/// let family = FamilyProfile::new("hybrid", Duration::from_secs(14_400))
///     .with_capabilities(["dim", "light_temperature"])
///     .with_battery_capabilities(["measure_battery"]);
///
/// let mains = family.resolve(PowerProfile::mains());
/// assert!(mains.is_enabled("dim"));
/// assert!(!mains.is_enabled("measure_battery"));
///
/// let battery = family.resolve(PowerProfile::battery(BatteryChemistry::Cr2032));
/// assert!(battery.is_enabled("measure_battery"));
/// assert_eq!(
///     battery.poll_interval("measure_battery"),
///     Some(Duration::from_secs(14_400))
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyProfile {
    /// Family identifier.
    pub family_id: String,
    /// Capabilities enabled for every power source.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Capabilities enabled only on battery power.
    #[serde(default)]
    pub battery_capabilities: Vec<String>,
    /// Capabilities enabled only on mains or DC power.
    #[serde(default)]
    pub mains_capabilities: Vec<String>,
    /// Poll interval on battery power.
    #[serde(with = "secs")]
    pub poll_interval_battery: Duration,
    /// Poll interval on mains or DC power, `None` to rely on reports.
    #[serde(default, with = "secs::option")]
    pub poll_interval_mains: Option<Duration>,
    /// Preferred chemistry within the detected voltage class.
    #[serde(default)]
    pub battery_hint: Option<BatteryChemistry>,
    /// Data-point to capability mapping.
    #[serde(default)]
    pub datapoints: Vec<DpMapping>,
}

impl FamilyProfile {
    /// Creates an empty family.
    #[must_use]
    pub fn new(family_id: impl Into<String>, poll_interval_battery: Duration) -> Self {
        Self {
            family_id: family_id.into(),
            capabilities: Vec::new(),
            battery_capabilities: Vec::new(),
            mains_capabilities: Vec::new(),
            poll_interval_battery,
            poll_interval_mains: None,
            battery_hint: None,
            datapoints: Vec::new(),
        }
    }

    /// Sets the capabilities enabled for every power source.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the battery-only capabilities.
    #[must_use]
    pub fn with_battery_capabilities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.battery_capabilities = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the mains-only capabilities.
    #[must_use]
    pub fn with_mains_capabilities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mains_capabilities = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the mains poll interval.
    #[must_use]
    pub const fn with_poll_interval_mains(mut self, interval: Duration) -> Self {
        self.poll_interval_mains = Some(interval);
        self
    }

    /// Sets the battery chemistry hint.
    #[must_use]
    pub const fn with_battery_hint(mut self, chemistry: BatteryChemistry) -> Self {
        self.battery_hint = Some(chemistry);
        self
    }

    /// Sets the data-point mapping.
    #[must_use]
    pub fn with_datapoints(mut self, datapoints: Vec<DpMapping>) -> Self {
        self.datapoints = datapoints;
        self
    }

    /// Computes the capability set for a power profile.
    ///
    /// Every capability named anywhere in the family gets a decision.
    /// Enabled capabilities are polled at `poll_interval_battery` on battery
    /// and at `poll_interval_mains` otherwise; low-voltage DC counts as
    /// mains.
    #[must_use]
    pub fn resolve(&self, profile: PowerProfile) -> CapabilitySet {
        let on_battery = profile.is_battery();
        let (active, inactive) = if on_battery {
            (&self.battery_capabilities, &self.mains_capabilities)
        } else {
            (&self.mains_capabilities, &self.battery_capabilities)
        };
        let poll_interval = if on_battery {
            Some(self.poll_interval_battery)
        } else {
            self.poll_interval_mains
        };

        let mut decisions = BTreeMap::new();
        for name in inactive {
            decisions.insert(name.clone(), CapabilityDecision::disabled());
        }
        for name in self.capabilities.iter().chain(active) {
            decisions.insert(name.clone(), CapabilityDecision::enabled(poll_interval));
        }

        CapabilitySet { decisions }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidFamily {
            family: self.family_id.clone(),
            message,
        };

        if self.family_id.trim().is_empty() {
            return Err(invalid("family_id is empty".to_string()));
        }
        if self.poll_interval_battery.is_zero() {
            return Err(invalid("poll_interval_battery must be positive".to_string()));
        }
        if self.poll_interval_mains.is_some_and(|d| d.is_zero()) {
            return Err(invalid("poll_interval_mains must be positive".to_string()));
        }

        let known = |name: &str| {
            self.capabilities
                .iter()
                .chain(&self.battery_capabilities)
                .chain(&self.mains_capabilities)
                .any(|c| c == name)
        };
        for mapping in &self.datapoints {
            if let Some(name) = mapping.capability()
                && !known(name)
            {
                return Err(invalid(format!(
                    "datapoint {} maps to undeclared capability {name}",
                    mapping.dp()
                )));
            }
            if let DpMapping::Scaled { dp, divisor, .. } = mapping
                && *divisor == 0.0
            {
                return Err(invalid(format!("datapoint {dp} has a zero divisor")));
            }
        }
        Ok(())
    }
}

/// A lookup table of family profiles.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    families: BTreeMap<String, FamilyProfile>,
}

impl CapabilityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        let mut families = BTreeMap::new();
        for family in builtin_families() {
            families.insert(family.family_id.clone(), family);
        }
        Self { families }
    }

    /// Parses a table from a JSON array of family profiles.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed JSON,
    /// [`ConfigError::DuplicateFamily`] if a family id repeats, or
    /// [`ConfigError::InvalidFamily`] for an inconsistent family.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let families: Vec<FamilyProfile> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for family in families {
            table.insert(family)?;
        }
        tracing::debug!(families = table.len(), "Loaded capability table");
        Ok(table)
    }

    /// Adds a family.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateFamily`] if the id is taken or
    /// [`ConfigError::InvalidFamily`] if the profile is inconsistent.
    pub fn insert(&mut self, family: FamilyProfile) -> Result<(), ConfigError> {
        family.validate()?;
        if self.families.contains_key(&family.family_id) {
            return Err(ConfigError::DuplicateFamily(family.family_id));
        }
        self.families.insert(family.family_id.clone(), family);
        Ok(())
    }

    /// Returns a family profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFamily`] if the id is not in the table.
    pub fn get(&self, family_id: &str) -> Result<&FamilyProfile, ConfigError> {
        self.families
            .get(family_id)
            .ok_or_else(|| ConfigError::UnknownFamily(family_id.to_string()))
    }

    /// Resolves the capability set of a family for a power profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFamily`] if the id is not in the table.
    pub fn resolve(
        &self,
        family_id: &str,
        profile: PowerProfile,
    ) -> Result<CapabilitySet, ConfigError> {
        Ok(self.get(family_id)?.resolve(profile))
    }

    /// Iterates over family ids.
    pub fn family_ids(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Returns the number of families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

fn builtin_families() -> Vec<FamilyProfile> {
    const HOUR: Duration = Duration::from_secs(3_600);

    vec![
        FamilyProfile::new("hybrid_light", Duration::from_secs(4 * 3_600))
            .with_capabilities(["onoff", "dim", "light_temperature"])
            .with_battery_capabilities(["measure_battery"])
            .with_datapoints(vec![
                DpMapping::bool(1, "onoff"),
                DpMapping::scaled(2, "dim", 1_000.0),
                DpMapping::scaled(3, "light_temperature", 1_000.0),
                DpMapping::percent(15, "measure_battery"),
            ]),
        FamilyProfile::new("switch", HOUR)
            .with_capabilities(["onoff"])
            .with_battery_capabilities(["measure_battery"])
            .with_datapoints(vec![
                DpMapping::bool(1, "onoff"),
                DpMapping::percent(15, "measure_battery"),
            ]),
        FamilyProfile::new("plug", HOUR)
            .with_capabilities(["onoff"])
            .with_mains_capabilities([
                "measure_power",
                "meter_power",
                "measure_voltage",
                "measure_current",
            ])
            .with_poll_interval_mains(Duration::from_secs(60))
            .with_datapoints(vec![
                DpMapping::bool(1, "onoff"),
                DpMapping::scaled(17, "meter_power", 100.0),
                DpMapping::scaled(18, "measure_current", 1_000.0),
                DpMapping::scaled(19, "measure_power", 10.0),
                DpMapping::scaled(20, "measure_voltage", 10.0),
            ]),
        FamilyProfile::new("button", Duration::from_secs(4 * 3_600))
            .with_battery_capabilities(["measure_battery"])
            .with_battery_hint(BatteryChemistry::Cr2032)
            .with_datapoints(vec![
                DpMapping::enum_press(1, Endpoint::new(1)),
                DpMapping::enum_press(2, Endpoint::new(2)),
                DpMapping::enum_press(3, Endpoint::new(3)),
                DpMapping::enum_press(4, Endpoint::new(4)),
                DpMapping::percent(10, "measure_battery"),
            ]),
        FamilyProfile::new("sensor", HOUR)
            .with_capabilities(["measure_temperature", "measure_humidity"])
            .with_battery_capabilities(["measure_battery"])
            .with_battery_hint(BatteryChemistry::Aaa)
            .with_datapoints(vec![
                DpMapping::scaled(1, "measure_temperature", 10.0),
                DpMapping::percent(2, "measure_humidity"),
                DpMapping::percent(4, "measure_battery"),
            ]),
        FamilyProfile::new("cover", HOUR)
            .with_capabilities(["windowcoverings_set"])
            .with_battery_capabilities(["measure_battery"])
            .with_datapoints(vec![
                DpMapping::scaled(2, "windowcoverings_set", 100.0),
                DpMapping::percent(13, "measure_battery"),
            ]),
    ]
}

/// Serde helpers for durations given in whole seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.serialize_some(&d.as_secs()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(deserializer).map(|secs| secs.map(Duration::from_secs))
        }
    }
}
