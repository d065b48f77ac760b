#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use actix::{Actor, Addr};
use engine_server::{
    node::{EngineNode, GetHostedRooms, NodeConfig, NodeDeps},
    repository::{MapRecord, MemoryRoomRepository},
};
use futures::{channel::mpsc::UnboundedReceiver, StreamExt};
use message_bus::{BusMessage, MemoryBus};
use room_core::RoomId;
use uuid::Uuid;

pub const ENGINE_ID: &str = "engine-test";

pub fn node_config(flush_interval: Duration) -> NodeConfig {
    NodeConfig {
        engine_id: ENGINE_ID.to_string(),
        heartbeat_interval: Duration::from_millis(50),
        flush_interval,
        history_limit: 16,
    }
}

pub fn open_map(width: i32, height: i32) -> MapRecord {
    MapRecord {
        id: Uuid::new_v4(),
        width,
        height,
        spawn: (0, 0),
        blocked: vec![],
    }
}

pub struct Harness {
    pub bus: MemoryBus,
    pub repo: MemoryRoomRepository,
    pub node: Addr<EngineNode>,
}

impl Harness {
    pub fn start(flush_interval: Duration) -> Self {
        let bus = MemoryBus::new();
        let repo = MemoryRoomRepository::new();
        let node = EngineNode::new(
            node_config(flush_interval),
            NodeDeps {
                publisher: Arc::new(bus.clone()),
                repository: Arc::new(repo.clone()),
            },
        )
        .start();
        Self { bus, repo, node }
    }

    pub async fn hosted(&self) -> Vec<RoomId> {
        self.node.send(GetHostedRooms).await.unwrap()
    }
}

pub async fn next_message(rx: &mut UnboundedReceiver<BusMessage>) -> BusMessage {
    tokio::time::timeout(Duration::from_secs(2), rx.next())
        .await
        .expect("timed out waiting for bus message")
        .expect("bus closed")
}

pub async fn next_json(rx: &mut UnboundedReceiver<BusMessage>) -> serde_json::Value {
    serde_json::from_str(&next_message(rx).await.payload).unwrap()
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
