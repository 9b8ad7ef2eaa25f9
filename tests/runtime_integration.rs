// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for tokio-hosted sessions.

#![cfg(feature = "runtime")]

use std::time::Duration;

use meshdp_lib::capabilities::CapabilityTable;
use meshdp_lib::datapoints::CapabilityValue;
use meshdp_lib::device::{DeviceSession, SessionConfig};
use meshdp_lib::event::{DeviceEvent, DeviceId, EventBus};
use meshdp_lib::power::{BasicAttributes, PowerConfigReport};
use meshdp_lib::press::{ButtonEdge, PressKind};
use meshdp_lib::protocol::Frame;
use meshdp_lib::runtime::DeviceRuntime;
use meshdp_lib::types::{DataPoint, Endpoint};
use tokio::sync::mpsc;

fn spawn(
    family: &str,
    address: u64,
    bus: &EventBus,
) -> (DeviceRuntime, mpsc::UnboundedReceiver<Vec<u8>>) {
    let family = CapabilityTable::builtin().get(family).unwrap().clone();
    let session = DeviceSession::new(
        DeviceId::from_ieee_address(address),
        family,
        SessionConfig::default(),
    );
    let (outbound, frames) = mpsc::unbounded_channel();
    (DeviceRuntime::spawn(session, bus.clone(), outbound), frames)
}

// ============================================================================
// Shared Bus
// ============================================================================

mod shared_bus {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn events_are_tagged_per_device() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (plug, _plug_frames) = spawn("plug", 0x01, &bus);
        let (button, _button_frames) = spawn("button", 0x02, &bus);

        plug.initialize(BasicAttributes::new().with_power_source(0x01), false)
            .await
            .unwrap();
        button
            .initialize(BasicAttributes::new().with_battery_rated_voltage(3.0), true)
            .await
            .unwrap();

        let report = Frame::report(7, vec![DataPoint::enumeration(1, 0)]);
        button
            .packet_received(report.encode().unwrap())
            .await
            .unwrap();

        loop {
            let event = EventBus::next_for(&mut rx, button.device_id())
                .await
                .unwrap();
            if let DeviceEvent::ButtonPressed { press, .. } = event {
                assert_eq!(press.kind, PressKind::Single);
                assert_eq!(press.endpoint, Endpoint::new(1));
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_of_one_device_leaves_the_other_running() {
        let bus = EventBus::new();
        let (first, _first_frames) = spawn("button", 0x10, &bus);
        let (second, _second_frames) = spawn("button", 0x11, &bus);
        let mut rx = bus.subscribe();

        first
            .button_edge(Endpoint::new(1), ButtonEdge::Down)
            .await
            .unwrap();
        second
            .button_edge(Endpoint::new(1), ButtonEdge::Down)
            .await
            .unwrap();
        first.teardown().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut presses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DeviceEvent::ButtonPressed { device_id, press } = event {
                presses.push((device_id, press.kind));
            }
        }
        assert_eq!(presses, vec![(second.device_id(), PressKind::Long)]);
    }
}

// ============================================================================
// Command Flow
// ============================================================================

mod command_flow {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acknowledged_write_completes() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (light, mut frames) = spawn("hybrid_light", 0x20, &bus);
        light
            .initialize(BasicAttributes::new().with_power_source(0x01), false)
            .await
            .unwrap();

        let id = light
            .set_capability("dim", CapabilityValue::Number(0.5))
            .await
            .unwrap();
        let sent = Frame::decode(&frames.recv().await.unwrap()).unwrap();
        assert_eq!(sent.datapoints, vec![DataPoint::value(2, 500)]);

        let ack = Frame::response(sent.sequence, vec![DataPoint::value(2, 500)]);
        light.packet_received(ack.encode().unwrap()).await.unwrap();

        let mut completed = None;
        let mut dim = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                DeviceEvent::TransactionCompleted { id, .. } => completed = Some(id),
                DeviceEvent::CapabilityChanged {
                    capability, value, ..
                } if capability == "dim" => dim = Some(value),
                _ => {}
            }
        }
        assert_eq!(completed, Some(id));
        assert_eq!(dim, Some(CapabilityValue::Number(0.5)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_runtime_tears_down() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (runtime, _frames) = spawn("switch", 0x30, &bus);
        let device_id = runtime.device_id();
        drop(runtime);

        let event = EventBus::next_for(&mut rx, device_id).await.unwrap();
        assert_eq!(event, DeviceEvent::TornDown { device_id });
    }
}

// ============================================================================
// Device Health
// ============================================================================

mod device_health {
    use super::*;

    async fn next_value(
        rx: &mut tokio::sync::broadcast::Receiver<DeviceEvent>,
        device_id: DeviceId,
    ) -> (String, CapabilityValue) {
        loop {
            if let Some(DeviceEvent::CapabilityChanged {
                capability, value, ..
            }) = EventBus::next_for(rx, device_id).await
            {
                return (capability, value);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn battery_voltage_is_read_for_coin_cells() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (button, _frames) = spawn("button", 0x40, &bus);
        button
            .initialize(BasicAttributes::new().with_battery_rated_voltage(3.0), true)
            .await
            .unwrap();

        let report = PowerConfigReport::new().with_battery_voltage(28);
        assert_eq!(button.power_config_report(report).await, Ok(Some(65)));
        assert_eq!(
            next_value(&mut rx, button.device_id()).await,
            ("measure_battery".to_string(), CapabilityValue::Number(65.0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lost_fragment_expires_on_tokio_timers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (switch, _frames) = spawn("switch", 0x41, &bus);
        switch
            .initialize(BasicAttributes::new().with_power_source(0x01), false)
            .await
            .unwrap();

        let fragment = vec![0x02, 0x00, 0x01, 0x05, 0x00, 0x01, 0x2c, 0xaa];
        switch.packet_received(fragment).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let report = Frame::report(2, vec![DataPoint::bool(1, true)]);
        switch
            .packet_received(report.encode().unwrap())
            .await
            .unwrap();
        assert_eq!(
            next_value(&mut rx, switch.device_id()).await,
            ("onoff".to_string(), CapabilityValue::Bool(true))
        );
    }
}
