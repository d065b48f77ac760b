use std::sync::Arc;

use futures::{channel::mpsc, StreamExt};
use tracing::warn;

use crate::Publisher;

/// Ordered fire-and-forget publishing.
///
/// Messages queued on one outbox are published one at a time in the order
/// they were queued; failures are logged and counted, never reported back.
/// The drain task ends once every clone of the outbox is dropped.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<(String, String)>,
}

impl Outbox {
    pub fn spawn(publisher: Arc<dyn Publisher>) -> Self {
        let (tx, mut rx) = mpsc::unbounded::<(String, String)>();
        tokio::spawn(async move {
            while let Some((topic, payload)) = rx.next().await {
                if let Err(e) = publisher.publish(&topic, payload).await {
                    metrics::PUBLISH_FAILURES_TOTAL.inc();
                    warn!("Failed to publish on {}: {}", topic, e);
                }
            }
        });
        Self { tx }
    }

    pub fn send(&self, topic: impl Into<String>, payload: String) {
        let topic = topic.into();
        if self.tx.unbounded_send((topic.clone(), payload)).is_err() {
            warn!("Outbox closed, dropping message for {}", topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBus;
    use std::time::Duration;

    #[tokio::test]
    async fn keeps_queue_order() {
        let bus = MemoryBus::new();
        let mut rx = bus.subscribe("t");
        let outbox = Outbox::spawn(Arc::new(bus.clone()));
        for i in 0..20 {
            outbox.send("t", i.to_string());
        }

        let mut seen = Vec::new();
        while seen.len() < 20 {
            let msg = tokio::time::timeout(Duration::from_secs(1), rx.next())
                .await
                .unwrap()
                .unwrap();
            seen.push(msg.payload.parse::<u32>().unwrap());
        }
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }
}
