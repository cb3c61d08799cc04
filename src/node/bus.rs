//! Topic publish/subscribe bus.
//!
//! Modules never hold references to each other. A producer publishes
//! to a topic; every module that subscribed beforehand receives a copy
//! on its own channel.

use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;

/// One bus event.
#[derive(Clone, Debug)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

/// Process-wide topic fan-out.
pub struct EventBus {
    topics: Mutex<HashMap<String, Vec<Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic. Every later publish to it lands on the
    /// returned receiver.
    pub fn subscribe(&self, topic: &str) -> Receiver<Event> {
        let (tx, rx) = unbounded();
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Publish to every current subscriber of `topic`. Subscribers
    /// whose receiver was dropped are pruned.
    pub fn publish(&self, topic: &str, payload: Value) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|tx| {
                tx.send(Event {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
            });
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let a = bus.subscribe("block.connected");
        let b = bus.subscribe("block.connected");
        let other = bus.subscribe("tx.accepted");

        bus.publish("block.connected", json!({ "height": 42 }));

        assert_eq!(a.try_recv().unwrap().payload["height"], 42);
        assert_eq!(b.try_recv().unwrap().payload["height"], 42);
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe("topic");
        drop(rx);
        bus.publish("topic", json!(null));

        let keep = bus.subscribe("topic");
        bus.publish("topic", json!(1));
        assert_eq!(keep.try_recv().unwrap().payload, json!(1));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish("nobody.listens", json!("void"));
    }
}
