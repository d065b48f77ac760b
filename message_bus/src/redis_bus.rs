use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::{BusError, Publisher};

/// Publishes over a shared Redis connection manager.
#[derive(Clone)]
pub struct RedisPublisher {
    redis: ConnectionManager,
}

impl RedisPublisher {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        let mut redis = self.redis.clone();
        redis.publish::<_, _, ()>(topic, payload).await?;
        Ok(())
    }
}
