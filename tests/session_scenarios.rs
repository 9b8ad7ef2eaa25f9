// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios for device sessions on a simulated clock.

use meshdp_lib::capabilities::{CapabilityTable, FamilyProfile};
use std::time::Duration;

use meshdp_lib::datapoints::{CapabilityValue, DpMapping};
use meshdp_lib::device::{DeviceSession, SessionConfig};
use meshdp_lib::event::{DeviceEvent, DeviceId};
use meshdp_lib::host::RecordingHost;
use meshdp_lib::power::{BasicAttributes, PowerConfigReport, detect};
use meshdp_lib::press::{ButtonEdge, PressEvent, PressKind};
use meshdp_lib::protocol::{self, Frame};
use meshdp_lib::types::{BatteryChemistry, DataPoint, Endpoint, PowerProfile, Timestamp};
use meshdp_lib::{DecodeError, Error};

// ============================================================================
// Helpers
// ============================================================================

struct Rig {
    session: DeviceSession,
    host: RecordingHost,
}

impl Rig {
    fn new(family: &str) -> Self {
        let family = CapabilityTable::builtin().get(family).unwrap().clone();
        Self::with_family(family)
    }

    fn with_family(family: FamilyProfile) -> Self {
        Self {
            session: DeviceSession::new(DeviceId::new(), family, SessionConfig::default()),
            host: RecordingHost::new(),
        }
    }

    fn mains(mut self) -> Self {
        let attrs = BasicAttributes::new().with_power_source(0x01);
        self.session.initialize(&attrs, false, &mut self.host).unwrap();
        self
    }

    fn coin_cell(mut self) -> Self {
        let attrs = BasicAttributes::new().with_battery_rated_voltage(3.0);
        self.session.initialize(&attrs, true, &mut self.host).unwrap();
        self
    }

    /// Fires every timer due up to `millis`, then leaves the clock there.
    fn run_until(&mut self, millis: u64) {
        let until = Timestamp::from_millis(millis);
        while let Some(token) = self.host.scheduler.pop_due(until) {
            self.session.on_timer_fired(token, &mut self.host);
        }
    }

    fn edge(&mut self, millis: u64, endpoint: u8, edge: ButtonEdge) {
        self.run_until(millis);
        self.session
            .on_button_edge(Endpoint::new(endpoint), edge, &mut self.host)
            .unwrap();
    }

    fn receive(&mut self, frame: &Frame) {
        let bytes = frame.encode().unwrap();
        self.session.on_frame_received(&bytes, &mut self.host).unwrap();
    }

    fn presses(&self) -> Vec<PressKind> {
        self.host.presses().iter().map(|p| p.kind).collect()
    }

    fn failures(&self) -> usize {
        self.host
            .events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::TransactionFailed { .. }))
            .count()
    }
}

// ============================================================================
// Press Classification
// ============================================================================

mod press_classification {
    use super::*;

    #[test]
    fn click_then_silence_is_single() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(50, 1, ButtonEdge::Up);
        rig.run_until(450);
        assert_eq!(rig.presses(), vec![PressKind::Single]);

        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Single]);
    }

    #[test]
    fn two_quick_clicks_are_one_double() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(50, 1, ButtonEdge::Up);
        rig.edge(150, 1, ButtonEdge::Down);
        rig.edge(200, 1, ButtonEdge::Up);
        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Double]);
    }

    #[test]
    fn hold_is_long_and_release_is_silent() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.run_until(799);
        assert!(rig.presses().is_empty());
        rig.run_until(800);
        assert_eq!(rig.presses(), vec![PressKind::Long]);

        rig.edge(1_200, 1, ButtonEdge::Up);
        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Long]);
    }

    #[test]
    fn release_after_long_press_counts_no_click() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(900, 1, ButtonEdge::Up);
        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Long]);
    }

    #[test]
    fn third_click_starts_a_new_cycle() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(50, 1, ButtonEdge::Up);
        rig.edge(150, 1, ButtonEdge::Down);
        rig.edge(200, 1, ButtonEdge::Up);
        rig.edge(260, 1, ButtonEdge::Down);
        rig.edge(310, 1, ButtonEdge::Up);
        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Double, PressKind::Single]);
    }

    #[test]
    fn endpoints_are_independent() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(10, 2, ButtonEdge::Down);
        rig.edge(50, 2, ButtonEdge::Up);
        rig.run_until(5_000);

        let presses = rig.host.presses();
        assert_eq!(
            presses,
            vec![
                PressEvent::new(Endpoint::new(2), PressKind::Single),
                PressEvent::new(Endpoint::new(1), PressKind::Long),
            ]
        );
    }

    #[test]
    fn bounce_is_ignored() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(10, 1, ButtonEdge::Up);
        rig.edge(20, 1, ButtonEdge::Down);
        rig.edge(80, 1, ButtonEdge::Up);
        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Single]);
    }

    #[test]
    fn device_classified_press_cancels_local_cycle() {
        let mut rig = Rig::new("button").coin_cell();
        rig.edge(0, 3, ButtonEdge::Down);
        rig.run_until(100);
        rig.receive(&Frame::report(1, vec![DataPoint::enumeration(3, 2)]));
        rig.run_until(5_000);
        assert_eq!(rig.presses(), vec![PressKind::Long]);
        assert_eq!(rig.host.scheduler.armed_count(), 0);
    }
}

// ============================================================================
// Transactions
// ============================================================================

mod transactions {
    use super::*;

    #[test]
    fn silent_device_gets_three_sends_then_failure() {
        let mut rig = Rig::new("switch").mains();
        rig.session
            .set_capability("onoff", &CapabilityValue::Bool(true), &mut rig.host)
            .unwrap();

        let checkpoints = [(2_999, 1), (3_000, 2), (5_999, 2), (6_000, 3), (8_999, 3)];
        for (millis, sends) in checkpoints {
            rig.run_until(millis);
            assert_eq!(rig.host.sent.len(), sends, "at {millis}ms");
            assert_eq!(rig.failures(), 0, "at {millis}ms");
        }

        rig.run_until(9_000);
        assert_eq!(rig.failures(), 1);
        assert_eq!(rig.host.sent.len(), 3);
        assert!(rig.host.sent.iter().all(|f| *f == rig.host.sent[0]));
    }

    #[test]
    fn late_response_after_retry_completes() {
        let mut rig = Rig::new("switch").mains();
        rig.session
            .send_datapoints(vec![DataPoint::bool(1, true)], &mut rig.host)
            .unwrap();
        rig.run_until(4_000);
        assert_eq!(rig.host.sent.len(), 2);

        let sequence = Frame::decode(&rig.host.sent[0]).unwrap().sequence;
        rig.receive(&Frame::response(sequence, Vec::new()));
        rig.run_until(60_000);

        assert_eq!(rig.failures(), 0);
        assert_eq!(rig.session.pending_transactions(), 0);
        assert!(
            rig.host
                .events
                .iter()
                .any(|e| matches!(e, DeviceEvent::TransactionCompleted { .. }))
        );
    }

    #[test]
    fn duplicate_response_is_harmless() {
        let mut rig = Rig::new("switch").mains();
        rig.session
            .send_datapoints(vec![DataPoint::bool(1, true)], &mut rig.host)
            .unwrap();
        let sequence = Frame::decode(&rig.host.sent[0]).unwrap().sequence;
        rig.receive(&Frame::response(sequence, Vec::new()));
        rig.receive(&Frame::response(sequence, Vec::new()));

        let completed = rig
            .host
            .events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::TransactionCompleted { .. }))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn invalid_record_is_rejected_before_sending() {
        let mut rig = Rig::new("switch").mains();
        let mut bad = DataPoint::bool(1, true);
        bad.dp_type = meshdp_lib::types::DpType::Value;
        let err = rig.session.send_datapoints(vec![bad], &mut rig.host).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
        assert!(rig.host.sent.is_empty());
        assert_eq!(rig.session.pending_transactions(), 0);
    }
}

// ============================================================================
// Teardown
// ============================================================================

mod teardown {
    use super::*;

    #[test]
    fn no_callbacks_after_teardown() {
        let mut rig = Rig::new("button").coin_cell();
        rig.edge(0, 1, ButtonEdge::Down);
        rig.edge(10, 2, ButtonEdge::Down);
        rig.edge(60, 2, ButtonEdge::Up);
        rig.session
            .send_datapoints(vec![DataPoint::value(10, 1)], &mut rig.host)
            .unwrap();
        assert!(rig.host.scheduler.armed_count() >= 3);

        rig.session.teardown(&mut rig.host);
        assert_eq!(rig.host.scheduler.armed_count(), 0);
        let before = rig.host.take_events();
        assert!(matches!(before.last(), Some(DeviceEvent::TornDown { .. })));

        rig.run_until(3_600_000);
        assert!(rig.host.events.is_empty());
        assert_eq!(rig.host.sent.len(), 1);
    }

    #[test]
    fn late_tokens_after_teardown_are_ignored() {
        let mut rig = Rig::new("button");
        rig.edge(0, 1, ButtonEdge::Down);
        let token = rig.host.scheduler.pop_due(Timestamp::from_millis(800)).unwrap();

        rig.session.teardown(&mut rig.host);
        rig.host.take_events();
        rig.session.on_timer_fired(token, &mut rig.host);
        assert!(rig.host.events.is_empty());
    }
}

// ============================================================================
// Power And Capabilities
// ============================================================================

mod power_and_capabilities {
    use super::*;

    fn remote(rated_volts: f32) -> Rig {
        let family = FamilyProfile::new("remote", Duration::from_secs(3_600))
            .with_battery_capabilities(["measure_battery"])
            .with_datapoints(vec![DpMapping::battery_voltage(33, "measure_battery", 1000.0)]);
        let mut rig = Rig::with_family(family);
        let attrs = BasicAttributes::new().with_battery_rated_voltage(rated_volts);
        rig.session.initialize(&attrs, true, &mut rig.host).unwrap();
        rig
    }

    fn battery_levels(rig: &Rig) -> Vec<CapabilityValue> {
        rig.host
            .events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::CapabilityChanged {
                    capability, value, ..
                } if capability == "measure_battery" => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn reported_voltage_reads_on_detected_chemistry() {
        let mut coin = remote(3.0);
        let mut alkaline = remote(1.5);
        assert_eq!(
            coin.session.profile(),
            Some(PowerProfile::battery(BatteryChemistry::Cr2032))
        );
        assert_eq!(
            alkaline.session.profile(),
            Some(PowerProfile::battery(BatteryChemistry::Aaa))
        );

        let reading = Frame::report(4, vec![DataPoint::value(33, 1_300)]);
        coin.receive(&reading);
        alkaline.receive(&reading);

        assert_eq!(battery_levels(&coin), vec![CapabilityValue::Number(0.0)]);
        assert_eq!(battery_levels(&alkaline), vec![CapabilityValue::Number(50.0)]);
    }

    #[test]
    fn power_config_voltage_reads_on_detected_chemistry() {
        let mut coin = remote(3.0);
        let mut alkaline = remote(1.5);
        let report = PowerConfigReport::new().with_battery_voltage(28);

        assert_eq!(
            coin.session.on_power_config_report(&report, &mut coin.host),
            Ok(Some(65))
        );
        assert_eq!(
            alkaline.session.on_power_config_report(&report, &mut alkaline.host),
            Ok(Some(100))
        );
        assert_eq!(battery_levels(&coin), vec![CapabilityValue::Number(65.0)]);
        assert_eq!(battery_levels(&alkaline), vec![CapabilityValue::Number(100.0)]);
    }

    #[test]
    fn power_config_on_mains_is_not_published() {
        let mut rig = Rig::new("hybrid_light").mains();
        let report = PowerConfigReport::new().with_percentage_remaining(150);
        assert_eq!(
            rig.session.on_power_config_report(&report, &mut rig.host),
            Ok(Some(75))
        );
        assert!(!rig.host.events.iter().any(DeviceEvent::is_value_update));
    }

    #[test]
    fn detection_and_resolution_are_repeatable() {
        let attrs = BasicAttributes::new()
            .with_zcl_rated_voltage(15)
            .with_battery_size(3);
        let first = detect(&attrs, true, None);
        assert_eq!(first, detect(&attrs, true, None));
        assert_eq!(first, PowerProfile::battery(BatteryChemistry::Aa));

        let table = CapabilityTable::builtin();
        assert_eq!(
            table.resolve("sensor", first).unwrap(),
            table.resolve("sensor", first).unwrap()
        );
    }

    #[test]
    fn battery_device_registers_battery_capability() {
        let rig = Rig::new("hybrid_light").coin_cell();
        assert!(rig.host.registered.contains_key("measure_battery"));
        assert!(rig.host.deregistered.is_empty());
        assert_eq!(
            rig.session.profile(),
            Some(PowerProfile::battery(BatteryChemistry::Cr2032))
        );
    }

    #[test]
    fn battery_attribute_without_cluster_falls_back_to_mains() {
        let mut rig = Rig::new("switch");
        let attrs = BasicAttributes::new().with_power_source(0x03);
        rig.session.initialize(&attrs, false, &mut rig.host).unwrap();
        assert_eq!(rig.session.profile(), Some(PowerProfile::mains()));
        assert_eq!(rig.host.registered["onoff"].poll_interval, None);
    }

    #[test]
    fn custom_table_from_json() {
        let table = CapabilityTable::from_json(
            r#"[{
                "family_id": "thermostat",
                "capabilities": ["target_temperature", "measure_temperature"],
                "battery_capabilities": ["measure_battery"],
                "poll_interval_battery": 1800,
                "datapoints": [
                    { "dp": 2, "capability": "target_temperature", "kind": "scaled", "divisor": 10 },
                    { "dp": 3, "capability": "measure_temperature", "kind": "scaled", "divisor": 10 },
                    { "dp": 14, "capability": "measure_battery", "kind": "percent" }
                ]
            }]"#,
        )
        .unwrap();
        let family = table.get("thermostat").unwrap().clone();
        let mut rig = Rig::with_family(family).coin_cell();

        rig.receive(&Frame::report(
            1,
            vec![DataPoint::value(3, 195), DataPoint::value(14, 87)],
        ));
        let values: Vec<_> = rig
            .host
            .events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::CapabilityChanged {
                    capability, value, ..
                } => Some((capability.as_str(), value.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            values,
            vec![
                ("measure_temperature", CapabilityValue::Number(19.5)),
                ("measure_battery", CapabilityValue::Number(87.0)),
            ]
        );

        rig.session
            .set_capability(
                "target_temperature",
                &CapabilityValue::Number(21.5),
                &mut rig.host,
            )
            .unwrap();
        let sent = Frame::decode(&rig.host.sent[0]).unwrap();
        assert_eq!(sent.datapoints, vec![DataPoint::value(2, 215)]);
    }
}

// ============================================================================
// Wire Robustness
// ============================================================================

mod wire_robustness {
    use super::*;

    #[test]
    fn every_record_prefix_is_truncated() {
        let records = [
            DataPoint::bool(1, true),
            DataPoint::value(2, -40),
            DataPoint::string(3, "living room"),
            DataPoint::raw(4, vec![0xde, 0xad, 0xbe, 0xef]),
        ];
        for dp in &records {
            let bytes = protocol::encode(dp).unwrap();
            assert_eq!(protocol::decode(&bytes), Ok((dp.clone(), bytes.len())));
            for k in 0..bytes.len() {
                assert!(
                    matches!(protocol::decode(&bytes[..k]), Err(DecodeError::Truncated { .. })),
                    "record {} prefix {k}",
                    dp.id
                );
            }
        }
    }

    #[test]
    fn malformed_frames_do_not_touch_other_devices() {
        let mut noisy = Rig::new("sensor").mains();
        let mut quiet = Rig::new("sensor").mains();

        for _ in 0..10 {
            noisy
                .session
                .on_frame_received(&[0x99, 0x00, 0x00], &mut noisy.host)
                .unwrap();
        }
        quiet.receive(&Frame::report(1, vec![DataPoint::value(2, 55)]));

        assert_eq!(
            noisy
                .host
                .events
                .iter()
                .filter(|e| matches!(e, DeviceEvent::DecodeFailuresEscalated { .. }))
                .count(),
            2
        );
        assert_eq!(quiet.session.decode_failures(), 0);
        assert!(quiet.host.events.iter().any(DeviceEvent::is_value_update));
    }

    /// A raw record declaring 300 payload bytes, of which only 3 arrive.
    fn dangling_fragment() -> Vec<u8> {
        vec![0x02, 0x00, 0x01, 0x05, 0x00, 0x01, 0x2c, 0xaa, 0xbb, 0xcc]
    }

    fn value_updates(rig: &Rig) -> usize {
        rig.host
            .events
            .iter()
            .filter(|e| e.is_value_update())
            .count()
    }

    #[test]
    fn lost_fragment_does_not_swallow_later_reports() {
        let mut rig = Rig::new("switch").mains();
        rig.session
            .on_frame_received(&dangling_fragment(), &mut rig.host)
            .unwrap();

        // The clock moves without the reassembly timer being delivered.
        rig.host.scheduler.set_time(Timestamp::from_millis(60_000));
        for _ in 0..10 {
            rig.receive(&Frame::report(2, vec![DataPoint::bool(1, true)]));
        }

        assert_eq!(value_updates(&rig), 10);
    }

    #[test]
    fn reassembly_timer_discards_partial_frame() {
        let mut rig = Rig::new("switch").mains();
        rig.session
            .on_frame_received(&dangling_fragment(), &mut rig.host)
            .unwrap();
        assert_eq!(rig.host.scheduler.armed_count(), 1);

        rig.run_until(1_999);
        assert_eq!(rig.session.decode_failures(), 0);
        rig.run_until(2_000);
        assert_eq!(rig.session.decode_failures(), 1);
        assert_eq!(rig.host.scheduler.armed_count(), 0);

        rig.receive(&Frame::report(3, vec![DataPoint::bool(1, false)]));
        assert_eq!(value_updates(&rig), 1);
        assert_eq!(rig.session.decode_failures(), 0);
    }

    #[test]
    fn slow_continuation_within_timeout_completes() {
        let mut rig = Rig::new("plug").mains();
        let bytes = Frame::report(2, vec![DataPoint::value(19, 1_500)])
            .encode()
            .unwrap();

        rig.session.on_frame_received(&bytes[..6], &mut rig.host).unwrap();
        rig.run_until(1_500);
        rig.session.on_frame_received(&bytes[6..], &mut rig.host).unwrap();

        assert_eq!(value_updates(&rig), 1);
        assert_eq!(rig.host.scheduler.armed_count(), 0);
        rig.run_until(10_000);
        assert_eq!(rig.session.decode_failures(), 0);
    }

    #[test]
    fn report_split_inside_a_record_is_applied_once() {
        let mut rig = Rig::new("plug").mains();
        let bytes = Frame::report(
            2,
            vec![DataPoint::value(19, 1_500), DataPoint::value(20, 2_301)],
        )
        .encode()
        .unwrap();

        for chunk in [&bytes[..6], &bytes[6..12], &bytes[12..]] {
            rig.session.on_frame_received(chunk, &mut rig.host).unwrap();
        }
        let updates = rig
            .host
            .events
            .iter()
            .filter(|e| e.is_value_update())
            .count();
        assert_eq!(updates, 2);
    }

    #[test]
    fn time_sync_reply_carries_wall_clock() {
        use chrono::{FixedOffset, TimeZone, Utc};
        use meshdp_lib::host::ManualScheduler;

        let clock = ManualScheduler::new()
            .with_wall_origin(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .with_utc_offset(FixedOffset::east_opt(2 * 3_600).unwrap());
        let family = CapabilityTable::builtin().get("sensor").unwrap().clone();
        let mut rig = Rig {
            session: DeviceSession::new(DeviceId::new(), family, SessionConfig::default()),
            host: RecordingHost::with_scheduler(clock),
        };

        rig.session
            .on_frame_received(&[0x24, 0x01, 0x02], &mut rig.host)
            .unwrap();
        let reply = &rig.host.sent[0];
        assert_eq!(reply[..3], [0x24, 0x01, 0x02]);
        assert_eq!(
            u32::from_be_bytes(reply[3..7].try_into().unwrap()),
            1_700_000_000
        );
        assert_eq!(
            u32::from_be_bytes(reply[7..11].try_into().unwrap()),
            1_700_007_200
        );
    }
}
