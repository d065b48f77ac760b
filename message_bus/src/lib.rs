//! Topic-addressed publish/subscribe plumbing shared by engines and the game
//! center.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod circuit_breaker;
pub mod memory;
pub mod outbox;
pub mod redis_bus;
pub mod subscriber;
pub mod topics;

pub use circuit_breaker::CircuitBreaker;
pub use memory::MemoryBus;
pub use outbox::Outbox;
pub use redis_bus::RedisPublisher;
pub use subscriber::{subscribe_loop, SubscriptionSpec};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("bus closed")]
    Closed,
}

/// One message as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;
}

/// Serializes `message` as JSON and publishes it on `topic`.
pub async fn publish_json<T: Serialize + ?Sized>(
    publisher: &dyn Publisher,
    topic: &str,
    message: &T,
) -> Result<(), BusError> {
    let payload = serde_json::to_string(message)?;
    publisher.publish(topic, payload).await
}
