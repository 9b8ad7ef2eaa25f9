// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::SessionConfig;
use crate::capabilities::{CapabilitySet, FamilyProfile};
use crate::datapoints::{self, CapabilityValue, Mapped};
use crate::error::{DeviceError, Error, TransactionError};
use crate::event::{DeviceEvent, DeviceId};
use crate::host::{DeviceHost, Scheduler, TimerHandle, TimerKind, TimerToken};
use crate::power::{self, BasicAttributes, PowerConfigReport};
use crate::press::{ButtonEdge, ButtonPressState, PressEvent, PressTracker};
use crate::protocol::{
    AssembledFrame, Frame, FrameAssembler, FrameKind, SequenceCounter, encode_time_sync_reply,
};
use crate::transaction::{TransactionId, TransactionTracker};
use crate::types::{BatteryChemistry, DataPoint, Endpoint, PowerProfile, Timestamp};

/// Capability fed by power configuration reports.
const BATTERY_CAPABILITY: &str = "measure_battery";

/// Lifecycle of a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, power source not yet detected.
    #[default]
    Created,
    /// Capabilities resolved and registered.
    Initialized,
    /// Torn down; every input is ignored or rejected.
    TornDown,
}

/// All protocol state of one device.
///
/// The host drives the session through its entry points and lends it a
/// [`DeviceHost`] for each call. The session never blocks and never holds
/// on to the host.
///
/// # Examples
///
/// ```
/// use meshdp_lib::capabilities::CapabilityTable;
/// use meshdp_lib::device::{DeviceSession, SessionConfig};
/// use meshdp_lib::event::{DeviceEvent, DeviceId};
/// use meshdp_lib::host::RecordingHost;
/// use meshdp_lib::power::BasicAttributes;
/// use meshdp_lib::protocol::Frame;
/// use meshdp_lib::types::DataPoint;
///
/// let family = CapabilityTable::builtin().get("plug").unwrap().clone();
/// let mut session = DeviceSession::new(DeviceId::new(), family, SessionConfig::default());
/// let mut host = RecordingHost::new();
///
/// let mains = BasicAttributes::new().with_power_source(0x01);
/// session.initialize(&mains, false, &mut host).unwrap();
/// assert!(host.registered.contains_key("measure_power"));
///
/// let report = Frame::report(1, vec![DataPoint::value(19, 1234)]).encode().unwrap();
/// session.on_frame_received(&report, &mut host).unwrap();
/// assert!(matches!(
///     host.events.last(),
///     Some(DeviceEvent::CapabilityChanged { capability, .. }) if capability == "measure_power"
/// ));
/// ```
#[derive(Debug)]
pub struct DeviceSession {
    device_id: DeviceId,
    family: FamilyProfile,
    config: SessionConfig,
    state: SessionState,
    profile: Option<PowerProfile>,
    capabilities: CapabilitySet,
    assembler: FrameAssembler,
    sequence: SequenceCounter,
    transactions: TransactionTracker,
    presses: PressTracker,
    sweep_timer: Option<TimerHandle>,
    sweep_epoch: u64,
    reassembly_started: Option<Timestamp>,
    reassembly_timer: Option<TimerHandle>,
    reassembly_epoch: u64,
    decode_failures: u32,
}

impl DeviceSession {
    /// Creates a session for a device of the given family.
    #[must_use]
    pub fn new(device_id: DeviceId, family: FamilyProfile, config: SessionConfig) -> Self {
        Self {
            device_id,
            family,
            config,
            state: SessionState::Created,
            profile: None,
            capabilities: CapabilitySet::default(),
            assembler: FrameAssembler::new(),
            sequence: SequenceCounter::new(),
            transactions: TransactionTracker::new(config.transaction),
            presses: PressTracker::new(config.press),
            sweep_timer: None,
            sweep_epoch: 0,
            reassembly_started: None,
            reassembly_timer: None,
            reassembly_epoch: 0,
            decode_failures: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the device id.
    #[must_use]
    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Returns the family profile.
    #[must_use]
    pub const fn family(&self) -> &FamilyProfile {
        &self.family
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once [`initialize`](Self::initialize) succeeded and
    /// before teardown.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Initialized
    }

    /// Returns true after [`teardown`](Self::teardown).
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.state == SessionState::TornDown
    }

    /// Returns the detected power profile.
    #[must_use]
    pub const fn profile(&self) -> Option<PowerProfile> {
        self.profile
    }

    /// Returns the resolved capabilities. Empty before initialization.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns the number of commands awaiting a response.
    #[must_use]
    pub fn pending_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Returns the press state of an endpoint.
    #[must_use]
    pub fn press_state(&self, endpoint: Endpoint) -> Option<&ButtonPressState> {
        self.presses.state(endpoint)
    }

    /// Returns the current run of consecutive decode failures.
    #[must_use]
    pub const fn decode_failures(&self) -> u32 {
        self.decode_failures
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Detects the power source and registers the resulting capabilities.
    ///
    /// Enabled capabilities are registered with their poll interval and
    /// disabled ones are deregistered. The result is fixed for the lifetime
    /// of the session.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::AlreadyInitialized`] on a second call.
    /// - [`DeviceError::TornDown`] after teardown.
    pub fn initialize<H>(
        &mut self,
        attrs: &BasicAttributes,
        power_config_present: bool,
        host: &mut H,
    ) -> Result<&CapabilitySet, DeviceError>
    where
        H: DeviceHost + ?Sized,
    {
        match self.state {
            SessionState::Created => {}
            SessionState::Initialized => return Err(DeviceError::AlreadyInitialized),
            SessionState::TornDown => return Err(DeviceError::TornDown),
        }

        let profile = power::detect(attrs, power_config_present, self.family.battery_hint);
        let capabilities = self.family.resolve(profile);

        for (name, decision) in capabilities.iter() {
            if decision.enabled {
                host.register_capability(name, decision);
            } else {
                host.deregister_capability(name);
            }
        }

        let enabled: Vec<String> = capabilities.enabled().map(str::to_owned).collect();
        tracing::info!(
            device_id = %self.device_id,
            family = %self.family.family_id,
            %profile,
            ?enabled,
            "Device initialized"
        );

        self.profile = Some(profile);
        self.capabilities = capabilities;
        self.state = SessionState::Initialized;
        host.publish(DeviceEvent::Initialized {
            device_id: self.device_id,
            profile,
            enabled,
        });

        Ok(&self.capabilities)
    }

    /// Cancels every armed timer and drops all protocol state.
    ///
    /// Pending commands are dropped without a failure notification. Once
    /// this returns no timer armed by the session will produce an event.
    /// Calling it again does nothing.
    pub fn teardown<H>(&mut self, host: &mut H)
    where
        H: DeviceHost + ?Sized,
    {
        if self.is_torn_down() {
            return;
        }

        self.presses.teardown(host);
        if let Some(handle) = self.sweep_timer.take() {
            host.cancel(handle);
        }
        self.sweep_epoch += 1;
        self.disarm_reassembly(host);

        let dropped = self.transactions.len();
        self.transactions.clear();
        self.assembler.clear();
        self.state = SessionState::TornDown;

        tracing::info!(
            device_id = %self.device_id,
            dropped_transactions = dropped,
            "Device torn down"
        );
        host.publish(DeviceEvent::TornDown {
            device_id: self.device_id,
        });
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Feeds one radio packet.
    ///
    /// Packets accumulate until they form a complete frame. Malformed input
    /// is logged and counted, never returned: the next packet starts fresh.
    /// A partial frame whose continuation does not arrive within the
    /// reassembly timeout is discarded and counted as one failure.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::TornDown`] after teardown.
    pub fn on_frame_received<H>(&mut self, packet: &[u8], host: &mut H) -> Result<(), DeviceError>
    where
        H: DeviceHost + ?Sized,
    {
        if self.is_torn_down() {
            return Err(DeviceError::TornDown);
        }

        if let Some(started) = self.reassembly_started
            && host.now() >= started + self.config.reassembly_timeout
        {
            self.discard_partial_frame(host);
        }

        let was_pending = self.assembler.is_pending();
        let result = self.assembler.push(packet);
        if !self.assembler.is_pending() {
            self.disarm_reassembly(host);
        } else if !was_pending {
            self.arm_reassembly(host);
        }

        let assembled = match result {
            Ok(Some(assembled)) => assembled,
            Ok(None) => return Ok(()),
            Err(error) => {
                tracing::warn!(device_id = %self.device_id, %error, "Dropping malformed frame");
                self.count_decode_failures(1, host);
                return Ok(());
            }
        };

        let frame = self.note_skipped(assembled, host);
        tracing::debug!(device_id = %self.device_id, %frame, "Frame received");

        match frame.kind {
            FrameKind::Response => {
                if let Some(id) = self.transactions.on_response(frame.sequence) {
                    host.publish(DeviceEvent::TransactionCompleted {
                        device_id: self.device_id,
                        id,
                        sequence: frame.sequence,
                    });
                    self.rearm_sweep(host);
                }
                self.apply_records(&frame.datapoints, host);
            }
            FrameKind::Report => self.apply_records(&frame.datapoints, host),
            FrameKind::Command => {
                tracing::debug!(
                    device_id = %self.device_id,
                    sequence = frame.sequence,
                    "Ignoring command frame sent by device"
                );
            }
            FrameKind::TimeSync => {
                let reply =
                    encode_time_sync_reply(frame.sequence, host.wall_clock(), host.utc_offset());
                tracing::debug!(
                    device_id = %self.device_id,
                    sequence = frame.sequence,
                    "Answering time sync"
                );
                host.send(reply);
            }
        }

        Ok(())
    }

    /// Feeds a power configuration cluster report.
    ///
    /// Returns the battery level read from the report, which is also
    /// published as `measure_battery` when that capability is enabled.
    /// Voltages are read on the discharge curve of the detected chemistry.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotInitialized`] before initialization and
    /// [`DeviceError::TornDown`] after teardown.
    pub fn on_power_config_report<H>(
        &mut self,
        report: &PowerConfigReport,
        host: &mut H,
    ) -> Result<Option<u8>, DeviceError>
    where
        H: DeviceHost + ?Sized,
    {
        self.ensure_initialized()?;

        let Some(percent) = report.battery_percentage(self.chemistry()) else {
            return Ok(None);
        };
        if self.capabilities.is_enabled(BATTERY_CAPABILITY) {
            tracing::debug!(device_id = %self.device_id, percent, "Battery level reported");
            host.publish(DeviceEvent::capability_changed(
                self.device_id,
                BATTERY_CAPABILITY,
                CapabilityValue::Number(f64::from(percent)),
            ));
        }
        Ok(Some(percent))
    }

    /// Feeds a raw contact edge of a button endpoint.
    ///
    /// Returns the press the edge completed, which is also published.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::TornDown`] after teardown.
    pub fn on_button_edge<H>(
        &mut self,
        endpoint: Endpoint,
        edge: ButtonEdge,
        host: &mut H,
    ) -> Result<Option<PressEvent>, DeviceError>
    where
        H: DeviceHost + ?Sized,
    {
        if self.is_torn_down() {
            return Err(DeviceError::TornDown);
        }

        let press = self.presses.on_edge(endpoint, edge, host);
        if let Some(press) = press {
            host.publish(DeviceEvent::button_pressed(self.device_id, press));
        }
        Ok(press)
    }

    /// Handles a timer armed by this session.
    ///
    /// Stale tokens and anything arriving after teardown are ignored.
    pub fn on_timer_fired<H>(&mut self, token: TimerToken, host: &mut H)
    where
        H: DeviceHost + ?Sized,
    {
        if self.is_torn_down() {
            tracing::trace!(device_id = %self.device_id, ?token, "Timer after teardown");
            return;
        }

        match token.kind {
            TimerKind::TransactionSweep => {
                if token.epoch != self.sweep_epoch {
                    tracing::trace!(device_id = %self.device_id, ?token, "Stale sweep timer");
                    return;
                }
                self.sweep_timer = None;
                self.sweep(host);
            }
            TimerKind::Reassembly => {
                if token.epoch != self.reassembly_epoch {
                    tracing::trace!(device_id = %self.device_id, ?token, "Stale reassembly timer");
                    return;
                }
                self.reassembly_timer = None;
                if self.assembler.is_pending() {
                    self.discard_partial_frame(host);
                }
            }
            TimerKind::LongPress(_) | TimerKind::ClickSettle(_) => {
                if let Some(press) = self.presses.on_timer(token) {
                    host.publish(DeviceEvent::button_pressed(self.device_id, press));
                }
            }
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Sends a command carrying `records` and tracks it until answered.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::NotInitialized`] or [`DeviceError::TornDown`] if the
    ///   session is not live.
    /// - An encode error if a record's value does not match its type.
    /// - [`TransactionError::SequenceInUse`] if every sequence is taken.
    pub fn send_datapoints<H>(
        &mut self,
        records: Vec<DataPoint>,
        host: &mut H,
    ) -> Result<TransactionId, Error>
    where
        H: DeviceHost + ?Sized,
    {
        self.ensure_initialized()?;

        let sequence = self.allocate_sequence()?;
        let frame = Frame::command(sequence, records);
        let bytes = frame.encode()?;
        let id = self.transactions.issue(frame, host.now())?;

        host.send(bytes);
        tracing::debug!(device_id = %self.device_id, %id, sequence, "Command sent");
        self.rearm_sweep(host);
        Ok(id)
    }

    /// Writes a capability value through its data-point mapping.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::CapabilityDisabled`] if the capability is not
    ///   enabled on this device.
    /// - [`DeviceError::NotWritable`] if no mapping accepts the value.
    /// - Any error of [`send_datapoints`](Self::send_datapoints).
    pub fn set_capability<H>(
        &mut self,
        capability: &str,
        value: &CapabilityValue,
        host: &mut H,
    ) -> Result<TransactionId, Error>
    where
        H: DeviceHost + ?Sized,
    {
        self.ensure_initialized()?;
        if !self.capabilities.is_enabled(capability) {
            return Err(DeviceError::CapabilityDisabled(capability.to_owned()).into());
        }

        let record = datapoints::find_capability(&self.family.datapoints, capability)
            .and_then(|mapping| mapping.to_datapoint(value))
            .ok_or_else(|| DeviceError::NotWritable(capability.to_owned()))?;

        tracing::debug!(device_id = %self.device_id, capability, %value, "Setting capability");
        self.send_datapoints(vec![record], host)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_initialized(&self) -> Result<(), DeviceError> {
        match self.state {
            SessionState::Initialized => Ok(()),
            SessionState::Created => Err(DeviceError::NotInitialized),
            SessionState::TornDown => Err(DeviceError::TornDown),
        }
    }

    fn chemistry(&self) -> Option<BatteryChemistry> {
        self.profile.and_then(|profile| profile.chemistry())
    }

    fn allocate_sequence(&mut self) -> Result<u16, TransactionError> {
        let first = self.sequence.next_sequence();
        let mut sequence = first;
        while self.transactions.contains(sequence) {
            sequence = self.sequence.next_sequence();
            if sequence == first {
                return Err(TransactionError::SequenceInUse(sequence));
            }
        }
        Ok(sequence)
    }

    fn note_skipped<H>(&mut self, assembled: AssembledFrame, host: &mut H) -> Frame
    where
        H: DeviceHost + ?Sized,
    {
        if assembled.is_clean() {
            self.decode_failures = 0;
            return assembled.frame;
        }

        for skipped in &assembled.skipped {
            tracing::warn!(
                device_id = %self.device_id,
                offset = skipped.offset,
                dp = skipped.dp_id,
                error = %skipped.error,
                "Dropping malformed record"
            );
        }
        let count = u32::try_from(assembled.skipped.len()).unwrap_or(u32::MAX);
        self.count_decode_failures(count, host);
        assembled.frame
    }

    fn count_decode_failures<H>(&mut self, count: u32, host: &mut H)
    where
        H: DeviceHost + ?Sized,
    {
        let threshold = self.config.decode_failure_threshold;
        if threshold == 0 {
            return;
        }

        self.decode_failures = self.decode_failures.saturating_add(count);
        if self.decode_failures >= threshold {
            tracing::warn!(
                device_id = %self.device_id,
                count = self.decode_failures,
                "Persistent decode failures"
            );
            host.publish(DeviceEvent::DecodeFailuresEscalated {
                device_id: self.device_id,
                count: self.decode_failures,
            });
            self.decode_failures = 0;
        }
    }

    fn apply_records<H>(&mut self, records: &[DataPoint], host: &mut H)
    where
        H: DeviceHost + ?Sized,
    {
        for record in records {
            let Some(mapping) = datapoints::find(&self.family.datapoints, record.id) else {
                tracing::trace!(device_id = %self.device_id, dp = record.id, "Unmapped data point");
                continue;
            };

            match mapping.convert_with(record, self.chemistry()) {
                Some(Mapped::Capability { capability, value }) => {
                    if !self.capabilities.is_enabled(&capability) {
                        tracing::trace!(
                            device_id = %self.device_id,
                            %capability,
                            "Value for disabled capability"
                        );
                        continue;
                    }
                    tracing::debug!(device_id = %self.device_id, %capability, %value, "Capability changed");
                    host.publish(DeviceEvent::capability_changed(self.device_id, capability, value));
                }
                Some(Mapped::Press(press)) => {
                    if let Some(press) = self.presses.on_classified(press, host) {
                        host.publish(DeviceEvent::button_pressed(self.device_id, press));
                    }
                }
                None => {
                    tracing::debug!(
                        device_id = %self.device_id,
                        dp = record.id,
                        value = ?record.value,
                        "Data point value does not fit its mapping"
                    );
                }
            }
        }
    }

    fn sweep<H>(&mut self, host: &mut H)
    where
        H: DeviceHost + ?Sized,
    {
        let outcome = self.transactions.sweep(host.now());

        for frame in outcome.retransmit {
            match frame.encode() {
                Ok(bytes) => host.send(bytes),
                Err(error) => {
                    tracing::warn!(device_id = %self.device_id, %frame, %error, "Cannot re-encode command");
                }
            }
        }
        for failure in outcome.failed {
            host.publish(DeviceEvent::TransactionFailed {
                device_id: self.device_id,
                failure,
            });
        }

        self.rearm_sweep(host);
    }

    fn arm_reassembly<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        self.reassembly_epoch += 1;
        self.reassembly_started = Some(scheduler.now());
        let token = TimerToken::new(TimerKind::Reassembly, self.reassembly_epoch);
        self.reassembly_timer = Some(scheduler.schedule(self.config.reassembly_timeout, token));
    }

    fn disarm_reassembly<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        if let Some(handle) = self.reassembly_timer.take() {
            scheduler.cancel(handle);
        }
        if self.reassembly_started.take().is_some() {
            self.reassembly_epoch += 1;
        }
    }

    fn discard_partial_frame<H>(&mut self, host: &mut H)
    where
        H: DeviceHost + ?Sized,
    {
        tracing::warn!(
            device_id = %self.device_id,
            buffered = self.assembler.buffered(),
            "Partial frame timed out"
        );
        self.assembler.clear();
        self.disarm_reassembly(host);
        self.count_decode_failures(1, host);
    }

    fn rearm_sweep<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        if let Some(handle) = self.sweep_timer.take() {
            scheduler.cancel(handle);
        }
        let Some(deadline) = self.transactions.next_deadline() else {
            return;
        };

        self.sweep_epoch += 1;
        let delay = deadline.duration_since(scheduler.now());
        let token = TimerToken::new(TimerKind::TransactionSweep, self.sweep_epoch);
        self.sweep_timer = Some(scheduler.schedule(delay, token));
        tracing::trace!(device_id = %self.device_id, %deadline, "Sweep armed");
    }
}
