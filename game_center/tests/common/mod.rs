#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use actix::{Actor, Addr};
use futures::{channel::mpsc::UnboundedReceiver, StreamExt};
use game_center::{
    scheduler::{FleetView, GameCenter, GetFleet, HandleHeartbeat, SchedulerConfig},
    store::MemoryOwnershipStore,
};
use message_bus::{topics, BusMessage, MemoryBus};
use room_core::protocol::{AssignCommand, Heartbeat};

/// Periodic passes are pushed far out; tests drive them with messages.
pub fn manual_config(heartbeat_timeout: Duration) -> SchedulerConfig {
    SchedulerConfig {
        load_balance_interval: Duration::from_secs(3600),
        janitor_interval: Duration::from_secs(3600),
        heartbeat_timeout,
        assignment_grace: Duration::from_secs(3600),
    }
}

pub struct Harness {
    pub bus: MemoryBus,
    pub store: MemoryOwnershipStore,
    pub game_center: Addr<GameCenter>,
}

impl Harness {
    pub fn start(config: SchedulerConfig) -> Self {
        Self::start_with_store(config, MemoryOwnershipStore::new())
    }

    pub fn start_with_store(config: SchedulerConfig, store: MemoryOwnershipStore) -> Self {
        let bus = MemoryBus::new();
        let game_center =
            GameCenter::new(config, Arc::new(bus.clone()), Arc::new(store.clone())).start();
        Self {
            bus,
            store,
            game_center,
        }
    }

    pub async fn fleet(&self) -> FleetView {
        self.game_center.send(GetFleet).await.unwrap()
    }

    pub async fn beat(&self, engine_id: &str, is_first_ping: bool) {
        self.game_center
            .send(HandleHeartbeat(Heartbeat {
                engine_id: engine_id.to_string(),
                is_first_ping,
                rooms: None,
            }))
            .await
            .unwrap();
    }

    pub fn assignments(&self, engine_id: &str) -> UnboundedReceiver<BusMessage> {
        self.bus.subscribe(topics::engine_assign(engine_id))
    }
}

pub async fn next_command(rx: &mut UnboundedReceiver<BusMessage>) -> AssignCommand {
    let msg = tokio::time::timeout(Duration::from_secs(2), rx.next())
        .await
        .expect("timed out waiting for assign command")
        .expect("bus closed");
    serde_json::from_str(&msg.payload).unwrap()
}

pub async fn eventually_within<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    eventually_within(Duration::from_secs(2), check).await
}
