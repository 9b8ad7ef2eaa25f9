// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tokio host for device sessions.
//!
//! [`DeviceRuntime`] runs one [`DeviceSession`](crate::device::DeviceSession)
//! on its own task. Requests, radio packets, button edges and timer firings
//! are funnelled into that task and handled one at a time. Timers are
//! `tokio::time::sleep` tasks that post their token back and are aborted
//! on cancel or teardown.
//!
//! Events go out on an [`EventBus`](crate::event::EventBus); encoded frames
//! go out on an unbounded channel the radio driver drains.

mod device_runtime;
mod host;

pub use device_runtime::DeviceRuntime;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::{broadcast, mpsc};

    use super::*;
    use crate::capabilities::CapabilityTable;
    use crate::datapoints::CapabilityValue;
    use crate::device::{DeviceSession, SessionConfig};
    use crate::error::DeviceError;
    use crate::event::{DeviceEvent, DeviceId, EventBus};
    use crate::power::BasicAttributes;
    use crate::press::{ButtonEdge, PressEvent, PressKind};
    use crate::protocol::Frame;
    use crate::types::{DataPoint, Endpoint};

    fn spawn(family: &str) -> (DeviceRuntime, mpsc::UnboundedReceiver<Vec<u8>>) {
        let family = CapabilityTable::builtin().get(family).unwrap().clone();
        let session = DeviceSession::new(DeviceId::new(), family, SessionConfig::default());
        let (outbound, frames) = mpsc::unbounded_channel();
        (DeviceRuntime::spawn(session, EventBus::new(), outbound), frames)
    }

    fn mains() -> BasicAttributes {
        BasicAttributes::new().with_power_source(0x01)
    }

    fn drain(rx: &mut broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_shares_capabilities() {
        let (runtime, _frames) = spawn("hybrid_light");
        assert!(runtime.capabilities().is_empty());

        let set = runtime.initialize(mains(), false).await.unwrap();
        assert!(set.is_enabled("dim"));
        assert_eq!(runtime.capabilities(), set);
        assert!(!runtime.is_enabled("measure_battery"));
    }

    #[tokio::test(start_paused = true)]
    async fn report_is_published() {
        let (runtime, _frames) = spawn("sensor");
        let mut events = runtime.subscribe();
        runtime.initialize(mains(), false).await.unwrap();

        let bytes = Frame::report(4, vec![DataPoint::value(1, -55)]).encode().unwrap();
        runtime.packet_received(bytes).await.unwrap();

        let changed: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(DeviceEvent::is_value_update)
            .collect();
        assert_eq!(
            changed,
            vec![DeviceEvent::capability_changed(
                runtime.device_id(),
                "measure_temperature",
                CapabilityValue::Number(-5.5)
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_command_is_retried_on_tokio_timers() {
        let (runtime, mut frames) = spawn("switch");
        let mut events = runtime.subscribe();
        runtime.initialize(mains(), false).await.unwrap();

        runtime
            .set_capability("onoff", CapabilityValue::Bool(true))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let mut sent = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            sent.push(frame);
        }
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|f| *f == sent[0]));
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, DeviceEvent::TransactionFailed { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_press_from_edges() {
        let (runtime, _frames) = spawn("button");
        let mut events = runtime.subscribe();
        let ep = Endpoint::new(1);

        runtime.button_edge(ep, ButtonEdge::Down).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        runtime.button_edge(ep, ButtonEdge::Up).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let presses: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                DeviceEvent::ButtonPressed { press, .. } => Some(press),
                _ => None,
            })
            .collect();
        assert_eq!(presses, vec![PressEvent::new(ep, PressKind::Single)]);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_aborts_timers_and_stops_task() {
        let (runtime, _frames) = spawn("button");
        let mut events = runtime.subscribe();

        runtime
            .button_edge(Endpoint::new(1), ButtonEdge::Down)
            .await
            .unwrap();
        runtime.teardown().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let after = drain(&mut events);
        assert!(matches!(after.as_slice(), [DeviceEvent::TornDown { .. }]));
        assert_eq!(
            runtime.packet_received(vec![0x24, 0, 0]).await,
            Err(DeviceError::TornDown)
        );
        assert!(runtime.is_closed());
    }
}
