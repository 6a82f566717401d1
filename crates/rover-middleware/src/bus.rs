//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so every
//! subscriber receives every message and no subscriber can hold up the
//! publisher.  Publishing is synchronous, so the control thread can publish
//! without entering the async runtime.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | One snapshot per control tick (≈20 Hz) |
//! | [`Topic::SystemAlerts`] | Emergency stops and hardware faults |

use rover_types::TelemetrySnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity (events buffered before slow subscribers lag).
const DEFAULT_CAPACITY: usize = 64;

/// Routing lanes on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Telemetry,
    SystemAlerts,
}

/// Payloads carried on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Telemetry(TelemetrySnapshot),
    EmergencyStop { reason: String },
    HardwareFault { component: String, message: String },
}

/// Envelope for everything routed over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// e.g. `"rover-runtime::control_loop"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            source: source.into(),
            payload,
        }
    }
}

/// Shared event bus.  Clones share the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus; `capacity` applies to each topic independently.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            system_alerts,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of subscribers that were handed the event; `0`
    /// when nobody is listening, which is normal.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        self.topic_sender(topic).send(event).unwrap_or(0)
    }

    /// Subscribe to one topic.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.
    ///
    /// `Err(Lagged(n))` means `n` events were dropped for this subscriber;
    /// `Err(Closed)` means every sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry_event(speed: u8) -> Event {
        Event::new(
            "test",
            EventPayload::Telemetry(TelemetrySnapshot {
                speed,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish_to(Topic::Telemetry, telemetry_event(1)), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_topic() {
        let bus = EventBus::default();
        let mut telemetry = bus.subscribe_to(Topic::Telemetry);
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);

        assert_eq!(bus.publish_to(Topic::Telemetry, telemetry_event(12)), 1);

        let event = telemetry.recv().await.unwrap();
        assert_eq!(event, telemetry_event(12));
        assert!(alerts.try_recv().is_err());
        assert_eq!(telemetry.topic(), Topic::Telemetry);
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let bus = EventBus::default();
        let mut a = bus.subscribe_to(Topic::SystemAlerts);
        let mut b = bus.subscribe_to(Topic::SystemAlerts);
        let stop = Event::new(
            "cockpit",
            EventPayload::EmergencyStop {
                reason: "operator".into(),
            },
        );
        assert_eq!(bus.publish_to(Topic::SystemAlerts, stop.clone()), 2);
        assert_eq!(a.recv().await.unwrap(), stop);
        assert_eq!(b.recv().await.unwrap(), stop);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe_to(Topic::Telemetry);
        for i in 0..5 {
            bus.publish_to(Topic::Telemetry, telemetry_event(i));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap(), telemetry_event(3));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(telemetry_event(5)).unwrap();
        assert_eq!(json["payload"]["type"], "telemetry");
        assert_eq!(json["payload"]["data"]["speed"], 5);
    }
}
