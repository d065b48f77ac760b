use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use parking_lot::Mutex;

use crate::{topics, BusError, BusMessage, Publisher};

#[derive(Default)]
struct Inner {
    published: Vec<BusMessage>,
    subscribers: Vec<(String, mpsc::UnboundedSender<BusMessage>)>,
    fail_publish: bool,
}

/// In-process bus that records every publication and fans it out to local
/// subscribers. Used by tests and single-process runs.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives every later publication whose topic matches `pattern`.
    pub fn subscribe(&self, pattern: impl Into<String>) -> mpsc::UnboundedReceiver<BusMessage> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.lock().subscribers.push((pattern.into(), tx));
        rx
    }

    pub fn published(&self) -> Vec<BusMessage> {
        self.inner.lock().published.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().published.clear();
    }

    /// Makes every later publish fail with `BusError::Closed`.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().fail_publish = failing;
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        if inner.fail_publish {
            return Err(BusError::Closed);
        }
        let message = BusMessage {
            topic: topic.to_string(),
            payload,
        };
        inner
            .subscribers
            .retain(|(pattern, tx)| {
                if !topics::matches(pattern, topic) {
                    return !tx.is_closed();
                }
                tx.unbounded_send(message.clone()).is_ok()
            });
        inner.published.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn fans_out_to_matching_subscribers_only() {
        let bus = MemoryBus::new();
        let mut actions = bus.subscribe(topics::ROOM_ACTION_PATTERN);
        let mut heartbeats = bus.subscribe(topics::ENGINE_HEARTBEAT);

        bus.publish("room.action.x", "a".into()).await.unwrap();
        bus.publish(topics::ENGINE_HEARTBEAT, "h".into()).await.unwrap();

        assert_eq!(actions.next().await.unwrap().payload, "a");
        assert_eq!(heartbeats.next().await.unwrap().payload, "h");
        assert!(actions.try_next().is_err());
        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_on(topics::ENGINE_HEARTBEAT), vec!["h".to_string()]);
    }

    #[tokio::test]
    async fn failing_bus_records_nothing() {
        let bus = MemoryBus::new();
        bus.set_failing(true);
        assert!(matches!(
            bus.publish("t", "p".into()).await,
            Err(BusError::Closed)
        ));
        assert!(bus.published().is_empty());
    }
}
