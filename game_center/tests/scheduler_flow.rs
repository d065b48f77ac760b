mod common;

use std::time::Duration;

use common::*;
use game_center::{
    pubsub::spawn_memory_subscriber,
    scheduler::{
        GetFleet, HandleHeartbeat, HandleRoomCreated, HandleRoomDeleted, IsInitialized,
        Janitor, LoadBalance, SchedulerConfig,
    },
    store::MemoryOwnershipStore,
};
use message_bus::{publish_json, topics};
use room_core::protocol::{AssignCommand, Heartbeat, RoomCreated};
use uuid::Uuid;

#[actix::test]
async fn pending_room_is_assigned_once_an_engine_beats() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
    let mut e1 = h.assignments("e1");
    let room_id = Uuid::new_v4();

    h.game_center.send(HandleRoomCreated { room_id }).await.unwrap();
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(h.fleet().await.pending, vec![room_id]);
    assert!(h.bus.published().is_empty());

    h.beat("e1", true).await;
    h.game_center.send(LoadBalance).await.unwrap();

    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id });
    let fleet = h.fleet().await;
    assert!(fleet.pending.is_empty());
    assert_eq!(fleet.engines[0].rooms, vec![room_id]);

    let store = h.store.clone();
    assert!(eventually(|| {
        let store = store.clone();
        async move { store.owner(&room_id).as_deref() == Some("e1") }
    })
    .await);
}

#[actix::test]
async fn silent_engine_is_evicted_and_its_room_moves() {
    let h = Harness::start(manual_config(Duration::from_millis(150)));
    let mut e1 = h.assignments("E1");
    let mut e2 = h.assignments("E2");
    let room_id = Uuid::new_v4();

    h.beat("E1", true).await;
    h.game_center.send(HandleRoomCreated { room_id }).await.unwrap();
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id });

    tokio::time::sleep(Duration::from_millis(250)).await;
    h.game_center.send(Janitor).await.unwrap();

    let fleet = h.fleet().await;
    assert!(fleet.engines.is_empty());
    assert_eq!(fleet.pending, vec![room_id]);

    h.beat("E2", true).await;
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e2).await, AssignCommand::Start { room_id });
    assert!(h.fleet().await.pending.is_empty());

    let store = h.store.clone();
    assert!(eventually(|| {
        let store = store.clone();
        async move { store.owner(&room_id).as_deref() == Some("E2") }
    })
    .await);
}

#[actix::test]
async fn ownership_is_restored_from_the_store() {
    let store = MemoryOwnershipStore::new();
    let owned = Uuid::new_v4();
    let free = Uuid::new_v4();
    store.insert(owned, Some("e1".to_string()));
    store.insert(free, None);

    let h = Harness::start_with_store(manual_config(Duration::from_secs(10)), store);
    let mut e1 = h.assignments("e1");
    assert!(h.game_center.send(IsInitialized).await.unwrap());

    let fleet = h.fleet().await;
    assert_eq!(fleet.pending, vec![free]);
    assert_eq!(fleet.engines.len(), 1);
    assert_eq!(fleet.engines[0].rooms, vec![owned]);

    h.game_center
        .send(HandleHeartbeat(Heartbeat {
            engine_id: "e1".into(),
            is_first_ping: false,
            rooms: Some(vec![owned]),
        }))
        .await
        .unwrap();
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id: free });
}

#[actix::test]
async fn unavailable_store_delays_init() {
    let store = MemoryOwnershipStore::new();
    store.set_unavailable(true);
    let h = Harness::start_with_store(manual_config(Duration::from_secs(10)), store.clone());

    assert!(!h.game_center.send(IsInitialized).await.unwrap());

    store.set_unavailable(false);
    let addr = h.game_center.clone();
    assert!(eventually_within(Duration::from_secs(6), || {
        let addr = addr.clone();
        async move { addr.send(IsInitialized).await.unwrap() }
    })
    .await);
}

#[actix::test]
async fn failed_start_puts_the_room_back() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
    let room_id = Uuid::new_v4();
    h.beat("e1", true).await;
    h.game_center.send(HandleRoomCreated { room_id }).await.unwrap();

    h.bus.set_failing(true);
    h.game_center.send(LoadBalance).await.unwrap();

    let addr = h.game_center.clone();
    assert!(eventually(|| {
        let addr = addr.clone();
        async move {
            addr.send(GetFleet).await.unwrap().pending == vec![room_id]
        }
    })
    .await);

    h.bus.set_failing(false);
    let mut e1 = h.assignments("e1");
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id });
}

#[actix::test]
async fn deleted_room_is_stopped_on_its_owner() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
    let mut e1 = h.assignments("e1");
    let owned = Uuid::new_v4();
    let queued = Uuid::new_v4();

    h.beat("e1", true).await;
    h.game_center.send(HandleRoomCreated { room_id: owned }).await.unwrap();
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id: owned });

    h.game_center.send(HandleRoomCreated { room_id: queued }).await.unwrap();
    h.game_center.send(HandleRoomDeleted { room_id: queued }).await.unwrap();
    h.game_center.send(HandleRoomDeleted { room_id: owned }).await.unwrap();

    assert_eq!(next_command(&mut e1).await, AssignCommand::Stop { room_id: owned });
    let fleet = h.fleet().await;
    assert!(fleet.pending.is_empty());
    assert!(fleet.engines[0].rooms.is_empty());
}

#[actix::test]
async fn restarted_engine_gets_its_rooms_again() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
    let mut e1 = h.assignments("e1");
    let room_id = Uuid::new_v4();

    h.beat("e1", true).await;
    h.game_center.send(HandleRoomCreated { room_id }).await.unwrap();
    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id });

    h.beat("e1", true).await;
    assert_eq!(h.fleet().await.pending, vec![room_id]);

    h.game_center.send(LoadBalance).await.unwrap();
    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id });
}

#[actix::test]
async fn engine_running_someone_elses_room_is_told_to_stop() {
    let store = MemoryOwnershipStore::new();
    let room_id = Uuid::new_v4();
    store.insert(room_id, Some("e2".to_string()));
    let h = Harness::start_with_store(manual_config(Duration::from_secs(10)), store);
    let mut e1 = h.assignments("e1");

    h.game_center
        .send(HandleHeartbeat(Heartbeat {
            engine_id: "e1".into(),
            is_first_ping: false,
            rooms: Some(vec![room_id]),
        }))
        .await
        .unwrap();

    assert_eq!(next_command(&mut e1).await, AssignCommand::Stop { room_id });
    let fleet = h.fleet().await;
    let e2 = fleet.engines.iter().find(|e| e.engine_id == "e2").unwrap();
    assert_eq!(e2.rooms, vec![room_id]);
}

#[actix::test]
async fn bus_events_drive_the_periodic_passes() {
    let config = SchedulerConfig {
        load_balance_interval: Duration::from_millis(30),
        janitor_interval: Duration::from_millis(30),
        heartbeat_timeout: Duration::from_secs(10),
        assignment_grace: Duration::from_secs(10),
    };
    let h = Harness::start(config);
    spawn_memory_subscriber(&h.bus, h.game_center.clone());
    let mut e1 = h.assignments("e1");
    let room_id = Uuid::new_v4();

    publish_json(
        &h.bus,
        topics::ENGINE_HEARTBEAT,
        &Heartbeat {
            engine_id: "e1".into(),
            is_first_ping: true,
            rooms: Some(vec![]),
        },
    )
    .await
    .unwrap();
    publish_json(&h.bus, topics::ROOM_CREATED, &RoomCreated { room_id })
        .await
        .unwrap();
    // garbage is logged and skipped
    publish_json(&h.bus, topics::ROOM_DELETED, &"not an event")
        .await
        .unwrap();

    assert_eq!(next_command(&mut e1).await, AssignCommand::Start { room_id });
}
