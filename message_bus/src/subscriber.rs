use std::{sync::Arc, time::Duration};

use backoff::{backoff::Backoff, ExponentialBackoff};
use futures::StreamExt;
use redis::Client as RedisClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{BusMessage, CircuitBreaker};

const BREAKER_WAIT: Duration = Duration::from_secs(5);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Channels and glob patterns one subscriber listens on.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSpec {
    pub name: String,
    pub channels: Vec<String>,
    pub patterns: Vec<String>,
}

impl SubscriptionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }
}

async fn wait_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.cancelled() => true,
    }
}

/// Keeps a Redis subscription alive until `shutdown` fires, handing every
/// message to `handler`. Reconnects with exponential backoff and backs off
/// entirely while the breaker is open.
pub async fn subscribe_loop<F>(
    redis_client: RedisClient,
    subscription: SubscriptionSpec,
    mut handler: F,
    shutdown: CancellationToken,
    breaker: Arc<CircuitBreaker>,
) where
    F: FnMut(BusMessage) + Send,
{
    let name = subscription.name.clone();
    let mut backoff = ExponentialBackoff::default();

    loop {
        if shutdown.is_cancelled() {
            info!("[{}] Shutting down subscriber", name);
            return;
        }

        if let Some(remaining) = breaker.remaining_cooldown() {
            warn!("[{}] Circuit breaker is open for another {:?}", name, remaining);
            if wait_or_cancel(remaining.min(BREAKER_WAIT), &shutdown).await {
                return;
            }
            continue;
        }

        let conn = match redis_client.get_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                breaker.record_failure();
                let delay = backoff.next_backoff().unwrap_or(MAX_RETRY_DELAY);
                error!("[{}] Failed to connect to Redis: {}; retry in {:?}", name, e, delay);
                if wait_or_cancel(delay, &shutdown).await {
                    return;
                }
                continue;
            }
        };

        let mut pubsub = conn.into_pubsub();
        let mut subscribed = Ok(());
        for channel in &subscription.channels {
            if let Err(e) = pubsub.subscribe(channel).await {
                subscribed = Err(e);
                break;
            }
        }
        if subscribed.is_ok() {
            for pattern in &subscription.patterns {
                if let Err(e) = pubsub.psubscribe(pattern).await {
                    subscribed = Err(e);
                    break;
                }
            }
        }

        if let Err(e) = subscribed {
            breaker.record_failure();
            let delay = backoff.next_backoff().unwrap_or(MAX_RETRY_DELAY);
            error!("[{}] Failed to subscribe: {}; retry in {:?}", name, e, delay);
            if wait_or_cancel(delay, &shutdown).await {
                return;
            }
            continue;
        }

        breaker.record_success();
        backoff.reset();
        info!(
            "[{}] Subscribed to channels {:?} patterns {:?}",
            name, subscription.channels, subscription.patterns
        );

        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("[{}] Shutting down subscriber", name);
                    return;
                }
                next = stream.next() => {
                    let Some(msg) = next else {
                        warn!("[{}] Subscription stream ended, reconnecting", name);
                        break;
                    };
                    let topic = msg.get_channel_name().to_string();
                    match msg.get_payload::<String>() {
                        Ok(payload) => {
                            debug!("[{}] message on {}", name, topic);
                            handler(BusMessage { topic, payload });
                        }
                        Err(e) => error!("[{}] Failed to read payload from {}: {}", name, topic, e),
                    }
                }
            }
        }
    }
}
