// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::host::{Fired, RuntimeHost};
use crate::capabilities::CapabilitySet;
use crate::datapoints::CapabilityValue;
use crate::device::DeviceSession;
use crate::error::{DeviceError, Error};
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::power::{BasicAttributes, PowerConfigReport};
use crate::press::{ButtonEdge, PressEvent};
use crate::transaction::TransactionId;
use crate::types::{DataPoint, Endpoint};

/// Pending requests per device before callers wait.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Initialize {
        attrs: BasicAttributes,
        power_config_present: bool,
        reply: Reply<Result<CapabilitySet, DeviceError>>,
    },
    Packet {
        bytes: Vec<u8>,
        reply: Reply<Result<(), DeviceError>>,
    },
    PowerConfig {
        report: PowerConfigReport,
        reply: Reply<Result<Option<u8>, DeviceError>>,
    },
    Edge {
        endpoint: Endpoint,
        edge: ButtonEdge,
        reply: Reply<Result<Option<PressEvent>, DeviceError>>,
    },
    Send {
        records: Vec<DataPoint>,
        reply: Reply<Result<TransactionId, Error>>,
    },
    SetCapability {
        capability: String,
        value: CapabilityValue,
        reply: Reply<Result<TransactionId, Error>>,
    },
    Teardown {
        reply: Reply<()>,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialize { .. } => "Initialize",
            Self::Packet { .. } => "Packet",
            Self::PowerConfig { .. } => "PowerConfig",
            Self::Edge { .. } => "Edge",
            Self::Send { .. } => "Send",
            Self::SetCapability { .. } => "SetCapability",
            Self::Teardown { .. } => "Teardown",
        };
        f.write_str(name)
    }
}

/// A [`DeviceSession`] running on its own tokio task.
///
/// Every input is queued to the task and handled in order, so the session
/// itself never sees concurrent calls. Dropping every clone of the runtime
/// tears the session down.
///
/// # Examples
///
/// ```
/// use meshdp_lib::capabilities::CapabilityTable;
/// use meshdp_lib::device::{DeviceSession, SessionConfig};
/// use meshdp_lib::event::{DeviceId, EventBus};
/// use meshdp_lib::power::BasicAttributes;
/// use meshdp_lib::runtime::DeviceRuntime;
/// use tokio::sync::mpsc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let family = CapabilityTable::builtin().get("switch").unwrap().clone();
/// let session = DeviceSession::new(DeviceId::new(), family, SessionConfig::default());
/// let (outbound, _frames) = mpsc::unbounded_channel();
/// let runtime = DeviceRuntime::spawn(session, EventBus::new(), outbound);
///
/// let mains = BasicAttributes::new().with_power_source(0x01);
/// let capabilities = runtime.initialize(mains, false).await.unwrap();
/// assert!(capabilities.is_enabled("onoff"));
/// assert!(runtime.is_enabled("onoff"));
///
/// runtime.teardown().await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceRuntime {
    device_id: DeviceId,
    commands: mpsc::Sender<Command>,
    capabilities: Arc<RwLock<CapabilitySet>>,
    events: EventBus,
}

impl DeviceRuntime {
    /// Moves a session onto a new task.
    ///
    /// Outbound frames are delivered on `outbound`, events on `events`.
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        session: DeviceSession,
        events: EventBus,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        let device_id = session.device_id();
        let capabilities = Arc::new(RwLock::new(session.capabilities().clone()));
        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let host = RuntimeHost::new(device_id, fired_tx, outbound, events.clone());

        tokio::spawn(run(
            session,
            host,
            command_rx,
            fired_rx,
            Arc::clone(&capabilities),
        ));
        tracing::debug!(%device_id, "Device runtime started");

        Self {
            device_id,
            commands,
            capabilities,
            events,
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

    /// Returns a snapshot of the resolved capabilities.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities.read().clone()
    }

    /// Returns true if the capability is enabled.
    #[must_use]
    pub fn is_enabled(&self, capability: &str) -> bool {
        self.capabilities.read().is_enabled(capability)
    }

    /// Subscribes to the event bus the session publishes on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Returns true once the session task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Runs power detection and capability registration.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::initialize`]. [`DeviceError::TornDown`] is also
    /// returned once the task has stopped.
    pub async fn initialize(
        &self,
        attrs: BasicAttributes,
        power_config_present: bool,
    ) -> Result<CapabilitySet, DeviceError> {
        self.request(|reply| Command::Initialize {
            attrs,
            power_config_present,
            reply,
        })
        .await?
    }

    /// Hands a received radio packet to the session.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::TornDown`] after teardown.
    pub async fn packet_received(&self, bytes: Vec<u8>) -> Result<(), DeviceError> {
        self.request(|reply| Command::Packet { bytes, reply }).await?
    }

    /// Hands a power configuration report to the session.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::on_power_config_report`].
    pub async fn power_config_report(
        &self,
        report: PowerConfigReport,
    ) -> Result<Option<u8>, DeviceError> {
        self.request(|reply| Command::PowerConfig { report, reply }).await?
    }

    /// Hands a raw button edge to the session.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::TornDown`] after teardown.
    pub async fn button_edge(
        &self,
        endpoint: Endpoint,
        edge: ButtonEdge,
    ) -> Result<Option<PressEvent>, DeviceError> {
        self.request(|reply| Command::Edge {
            endpoint,
            edge,
            reply,
        })
        .await?
    }

    /// Sends a command and returns its transaction id.
    ///
    /// The result of the transaction is published on the event bus.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::send_datapoints`].
    pub async fn send_datapoints(&self, records: Vec<DataPoint>) -> Result<TransactionId, Error> {
        self.request(|reply| Command::Send { records, reply }).await?
    }

    /// Writes a capability value.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::set_capability`].
    pub async fn set_capability(
        &self,
        capability: impl Into<String>,
        value: CapabilityValue,
    ) -> Result<TransactionId, Error> {
        let capability = capability.into();
        self.request(|reply| Command::SetCapability {
            capability,
            value,
            reply,
        })
        .await?
    }

    /// Tears the session down and stops its task.
    ///
    /// All timers are aborted before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::TornDown`] if the task had already stopped.
    pub async fn teardown(&self) -> Result<(), DeviceError> {
        self.request(|reply| Command::Teardown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| DeviceError::TornDown)?;
        response.await.map_err(|_| DeviceError::TornDown)
    }
}

async fn run(
    mut session: DeviceSession,
    mut host: RuntimeHost,
    mut commands: mpsc::Receiver<Command>,
    mut fired: mpsc::UnboundedReceiver<Fired>,
    capabilities: Arc<RwLock<CapabilitySet>>,
) {
    let device_id = session.device_id();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::debug!(%device_id, "Device runtime dropped");
                    session.teardown(&mut host);
                    break;
                };
                tracing::trace!(%device_id, ?command, "Handling command");
                if handle(command, &mut session, &mut host, &capabilities).is_break() {
                    break;
                }
            }
            Some((timer, token)) = fired.recv() => {
                host.timer_fired(timer);
                session.on_timer_fired(token, &mut host);
            }
        }
    }

    host.abort_all();
    tracing::debug!(%device_id, "Device runtime stopped");
}

fn handle(
    command: Command,
    session: &mut DeviceSession,
    host: &mut RuntimeHost,
    capabilities: &RwLock<CapabilitySet>,
) -> ControlFlow<()> {
    // A caller that gave up waiting drops its receiver; that is not an error.
    match command {
        Command::Initialize {
            attrs,
            power_config_present,
            reply,
        } => {
            let result = session
                .initialize(&attrs, power_config_present, host)
                .cloned();
            if let Ok(set) = &result {
                *capabilities.write() = set.clone();
            }
            let _ = reply.send(result);
        }
        Command::Packet { bytes, reply } => {
            let _ = reply.send(session.on_frame_received(&bytes, host));
        }
        Command::PowerConfig { report, reply } => {
            let _ = reply.send(session.on_power_config_report(&report, host));
        }
        Command::Edge {
            endpoint,
            edge,
            reply,
        } => {
            let _ = reply.send(session.on_button_edge(endpoint, edge, host));
        }
        Command::Send { records, reply } => {
            let _ = reply.send(session.send_datapoints(records, host));
        }
        Command::SetCapability {
            capability,
            value,
            reply,
        } => {
            let _ = reply.send(session.set_capability(&capability, &value, host));
        }
        Command::Teardown { reply } => {
            session.teardown(host);
            tracing::debug!(
                device_id = %session.device_id(),
                leftover_timers = host.armed(),
                "Aborting timers"
            );
            host.abort_all();
            let _ = reply.send(());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}
