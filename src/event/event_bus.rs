// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast of device events to multiple subscribers.

use tokio::sync::broadcast;

use super::{DeviceEvent, DeviceId};

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fans device events out to every subscriber.
///
/// Backed by a tokio broadcast channel. A subscriber that falls more than
/// the channel capacity behind loses the oldest events and sees
/// `RecvError::Lagged`. Publishing never blocks, so a slow subscriber
/// cannot stall a device session.
///
/// # Examples
///
/// ```
/// use meshdp_lib::event::{DeviceEvent, DeviceId, EventBus};
///
/// let bus = EventBus::with_capacity(16);
/// let mut first = bus.subscribe();
/// let mut second = bus.subscribe();
///
/// let device_id = DeviceId::new();
/// assert_eq!(bus.subscriber_count(), 2);
/// bus.publish(DeviceEvent::TornDown { device_id });
/// assert!(first.try_recv().is_ok());
/// assert!(second.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Without subscribers the event is dropped.
    pub fn publish(&self, event: DeviceEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Event dropped, no subscribers");
        }
    }

    /// Waits for the next event of one device, skipping the others.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn next_for(
        rx: &mut broadcast::Receiver<DeviceEvent>,
        device_id: DeviceId,
    ) -> Option<DeviceEvent> {
        loop {
            match rx.recv().await {
                Ok(event) if event.device_id() == device_id => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
