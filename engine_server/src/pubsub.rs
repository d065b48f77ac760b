use std::sync::Arc;

use actix::Addr;
use futures::StreamExt;
use message_bus::{
    subscribe_loop, topics, BusMessage, CircuitBreaker, MemoryBus, SubscriptionSpec,
};
use redis::Client as RedisClient;
use room_core::protocol::{ActionResult, AssignCommand, RoomOpened};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    hub::{ClientHub, Deliver, Resync},
    node::{Assign, EngineNode, RouteAction},
};

/// Routes one bus message to the node or the hub.
pub fn route_bus_message(
    msg: BusMessage,
    engine_id: &str,
    node: &Addr<EngineNode>,
    hub: &Addr<ClientHub>,
) {
    if let Some(room_id) = topics::room_from_topic(topics::ROOM_ACTION_PREFIX, &msg.topic) {
        node.do_send(RouteAction {
            room_id,
            payload: msg.payload,
        });
        return;
    }

    if let Some(room_id) = topics::room_from_topic(topics::ROOM_RESULT_PREFIX, &msg.topic) {
        match serde_json::from_str::<ActionResult>(&msg.payload) {
            Ok(result) => hub.do_send(Deliver { room_id, result }),
            Err(e) => error!("Failed to parse result on {}: {}", msg.topic, e),
        }
        return;
    }

    if let Some(room_id) = topics::room_from_topic(topics::ROOM_OPENED_PREFIX, &msg.topic) {
        match serde_json::from_str::<RoomOpened>(&msg.payload) {
            Ok(opened) => {
                debug!("[{}] Opened on {} at version {}", room_id, opened.engine_id, opened.version);
                hub.do_send(Resync { room_id });
            }
            Err(e) => error!("Failed to parse room opened on {}: {}", msg.topic, e),
        }
        return;
    }

    if msg.topic == topics::engine_assign(engine_id) {
        match serde_json::from_str::<AssignCommand>(&msg.payload) {
            Ok(command) => {
                info!("[{}] Received {:?}", engine_id, command);
                node.do_send(Assign(command));
            }
            Err(e) => error!("Failed to parse assign command: {}", e),
        }
        return;
    }

    debug!("Ignoring message on {}", msg.topic);
}

fn subscription(engine_id: &str) -> SubscriptionSpec {
    SubscriptionSpec::new(format!("engine:{}", engine_id))
        .channel(topics::engine_assign(engine_id))
        .pattern(topics::ROOM_ACTION_PATTERN)
        .pattern(topics::ROOM_RESULT_PATTERN)
        .pattern(topics::ROOM_OPENED_PATTERN)
}

pub fn spawn_redis_subscriber(
    redis_client: RedisClient,
    engine_id: String,
    node: Addr<EngineNode>,
    hub: Addr<ClientHub>,
    shutdown_token: CancellationToken,
    circuit_breaker: Arc<CircuitBreaker>,
) {
    let spec = subscription(&engine_id);
    tokio::spawn(async move {
        let handler_engine_id = engine_id.clone();
        subscribe_loop(
            redis_client,
            spec,
            move |msg| route_bus_message(msg, &handler_engine_id, &node, &hub),
            shutdown_token,
            circuit_breaker,
        )
        .await;
        info!("[{}] Bus subscriber finished", engine_id);
    });
}

/// Same routing fed from an in-process bus.
pub fn spawn_memory_subscriber(
    bus: &MemoryBus,
    engine_id: String,
    node: Addr<EngineNode>,
    hub: Addr<ClientHub>,
) {
    let spec = subscription(&engine_id);
    let streams: Vec<_> = spec
        .channels
        .iter()
        .chain(spec.patterns.iter())
        .map(|topic| bus.subscribe(topic.clone()))
        .collect();
    let mut merged = futures::stream::select_all(streams);

    tokio::spawn(async move {
        while let Some(msg) = merged.next().await {
            route_bus_message(msg, &engine_id, &node, &hub);
        }
        warn!("[{}] Memory bus closed", engine_id);
    });
}
