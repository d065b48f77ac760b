use std::sync::Arc;

use actix::Addr;
use futures::StreamExt;
use message_bus::{
    subscribe_loop, topics, BusMessage, CircuitBreaker, MemoryBus, SubscriptionSpec,
};
use redis::Client as RedisClient;
use room_core::protocol::{Heartbeat, RoomCreated, RoomDeleted};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::scheduler::{GameCenter, HandleHeartbeat, HandleRoomCreated, HandleRoomDeleted};

/// Routes one bus message to the scheduler.
pub fn route_bus_message(msg: BusMessage, game_center: &Addr<GameCenter>) {
    match msg.topic.as_str() {
        topics::ENGINE_HEARTBEAT => match serde_json::from_str::<Heartbeat>(&msg.payload) {
            Ok(heartbeat) => game_center.do_send(HandleHeartbeat(heartbeat)),
            Err(e) => error!("Failed to parse heartbeat: {}", e),
        },
        topics::ROOM_CREATED => match serde_json::from_str::<RoomCreated>(&msg.payload) {
            Ok(event) => game_center.do_send(HandleRoomCreated {
                room_id: event.room_id,
            }),
            Err(e) => error!("Failed to parse room.created: {}", e),
        },
        topics::ROOM_DELETED => match serde_json::from_str::<RoomDeleted>(&msg.payload) {
            Ok(event) => game_center.do_send(HandleRoomDeleted {
                room_id: event.room_id,
            }),
            Err(e) => error!("Failed to parse room.deleted: {}", e),
        },
        other => debug!("Ignoring message on {}", other),
    }
}

fn subscription() -> SubscriptionSpec {
    SubscriptionSpec::new("game_center")
        .channel(topics::ENGINE_HEARTBEAT)
        .channel(topics::ROOM_CREATED)
        .channel(topics::ROOM_DELETED)
}

pub fn spawn_redis_subscriber(
    redis_client: RedisClient,
    game_center: Addr<GameCenter>,
    shutdown_token: CancellationToken,
    circuit_breaker: Arc<CircuitBreaker>,
) {
    tokio::spawn(async move {
        subscribe_loop(
            redis_client,
            subscription(),
            move |msg| route_bus_message(msg, &game_center),
            shutdown_token,
            circuit_breaker,
        )
        .await;
        info!("GameCenter bus subscriber finished");
    });
}

/// Same routing fed from an in-process bus.
pub fn spawn_memory_subscriber(bus: &MemoryBus, game_center: Addr<GameCenter>) {
    let streams: Vec<_> = subscription()
        .channels
        .into_iter()
        .map(|topic| bus.subscribe(topic))
        .collect();
    let mut merged = futures::stream::select_all(streams);

    tokio::spawn(async move {
        while let Some(msg) = merged.next().await {
            route_bus_message(msg, &game_center);
        }
        warn!("Memory bus closed");
    });
}
