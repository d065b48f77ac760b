mod common;

use std::{sync::Arc, time::Duration};

use actix::Actor;
use common::*;
use engine_server::{
    processor::{FlushDiff, GetSnapshot, ProcessAction, RoomProcessor, StopRoom},
    repository::MemoryRoomRepository,
};
use message_bus::{topics, MemoryBus, Outbox};
use room_core::{Action, RoomError, RoomMap, RoomState};
use uuid::Uuid;

fn spawn_processor(
    bus: &MemoryBus,
    repo: &MemoryRoomRepository,
    flush_interval: Duration,
) -> (Uuid, actix::Addr<RoomProcessor>) {
    let room_id = Uuid::new_v4();
    let state = RoomState::new(room_id, RoomMap::open(6, 6)).with_history_limit(4);
    let processor = RoomProcessor::new(
        state,
        Outbox::spawn(Arc::new(bus.clone())),
        Arc::new(repo.clone()),
        flush_interval,
    )
    .start();
    (room_id, processor)
}

fn join(user_id: Uuid) -> ProcessAction {
    ProcessAction {
        payload: serde_json::to_string(&Action::Join { user_id }.to_request()).unwrap(),
    }
}

#[actix::test]
async fn snapshots_can_look_back_within_history() {
    let bus = MemoryBus::new();
    let repo = MemoryRoomRepository::new();
    let (_room_id, processor) = spawn_processor(&bus, &repo, Duration::from_secs(60));

    let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for user in &users {
        processor.send(join(*user)).await.unwrap();
    }

    let now = processor.send(GetSnapshot::default()).await.unwrap().unwrap();
    assert_eq!(now.version, 3);
    assert_eq!(now.participants.len(), 3);

    let earlier = processor
        .send(GetSnapshot { at: Some(1) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(earlier.version, 1);
    assert_eq!(earlier.participants.len(), 1);
    assert_eq!(earlier.participants[0].user_id, users[0]);

    let future = processor.send(GetSnapshot { at: Some(9) }).await.unwrap();
    assert!(matches!(future, Err(RoomError::FutureVersion { .. })));
}

#[actix::test]
async fn history_window_bounds_look_back() {
    let bus = MemoryBus::new();
    let repo = MemoryRoomRepository::new();
    let (_room_id, processor) = spawn_processor(&bus, &repo, Duration::from_secs(60));

    for _ in 0..6 {
        processor.send(join(Uuid::new_v4())).await.unwrap();
    }
    let too_old = processor.send(GetSnapshot { at: Some(1) }).await.unwrap();
    assert!(matches!(too_old, Err(RoomError::HistoryExhausted { .. })));
    assert!(processor.send(GetSnapshot { at: Some(2) }).await.unwrap().is_ok());
}

#[actix::test]
async fn explicit_flush_writes_each_touched_participant_once() {
    let bus = MemoryBus::new();
    let repo = MemoryRoomRepository::new();
    let (room_id, processor) = spawn_processor(&bus, &repo, Duration::from_secs(60));

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    processor.send(join(a)).await.unwrap();
    processor.send(join(b)).await.unwrap();
    processor
        .send(ProcessAction {
            payload: serde_json::to_string(&Action::Exit { user_id: a }.to_request()).unwrap(),
        })
        .await
        .unwrap();
    processor.send(FlushDiff).await.unwrap();

    assert!(eventually(|| async { repo.write_count() == 2 }).await);
    assert!(!repo.participant(room_id, a).unwrap().active);
    assert!(repo.participant(room_id, b).unwrap().active);

    // nothing new to write
    processor.send(FlushDiff).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(repo.write_count(), 2);
}

#[actix::test]
async fn stopped_processor_ignores_new_actions() {
    let bus = MemoryBus::new();
    let repo = MemoryRoomRepository::new();
    let (room_id, processor) = spawn_processor(&bus, &repo, Duration::from_secs(60));
    let mut results = bus.subscribe(topics::room_result(room_id));

    processor.send(join(Uuid::new_v4())).await.unwrap();
    assert_eq!(next_json(&mut results).await["id"], 1);

    processor.do_send(StopRoom);
    processor.do_send(join(Uuid::new_v4()));
    assert!(eventually(|| async { !processor.connected() }).await);
    assert!(results.try_next().is_err());
    assert_eq!(repo.write_count(), 1);
}

#[actix::test]
async fn idle_processor_stops_without_writing() {
    let bus = MemoryBus::new();
    let repo = MemoryRoomRepository::new();
    let (_room_id, processor) = spawn_processor(&bus, &repo, Duration::from_secs(60));

    processor.send(StopRoom).await.unwrap();
    assert!(eventually(|| async { !processor.connected() }).await);
    assert_eq!(repo.write_count(), 0);
}
