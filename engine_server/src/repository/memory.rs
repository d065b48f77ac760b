use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use room_core::{DiffRecord, RoomId, UserId};
use uuid::Uuid;

use super::{MapRecord, RepositoryError, RoomRecord, RoomRepository};

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, RoomRecord>,
    maps: HashMap<Uuid, MapRecord>,
    participants: HashMap<RoomId, HashMap<UserId, DiffRecord>>,
    writes: usize,
}

/// In-process repository for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryRoomRepository {
    tables: Arc<Mutex<Tables>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a room on a fresh map and returns the room id.
    pub fn insert_room(&self, map: MapRecord) -> RoomId {
        let room_id = Uuid::new_v4();
        let mut tables = self.tables.lock();
        tables.rooms.insert(
            room_id,
            RoomRecord {
                id: room_id,
                map_id: map.id,
                engine_id: None,
            },
        );
        tables.maps.insert(map.id, map);
        room_id
    }

    pub fn insert_participant(&self, room_id: RoomId, record: DiffRecord) {
        self.tables
            .lock()
            .participants
            .entry(room_id)
            .or_default()
            .insert(record.user_id, record);
    }

    pub fn participant(&self, room_id: RoomId, user_id: UserId) -> Option<DiffRecord> {
        self.tables
            .lock()
            .participants
            .get(&room_id)
            .and_then(|rows| rows.get(&user_id))
            .cloned()
    }

    /// Successful upserts so far.
    pub fn write_count(&self) -> usize {
        self.tables.lock().writes
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoomRepository for MemoryRoomRepository {
    async fn load_room(&self, room_id: RoomId) -> Result<RoomRecord, RepositoryError> {
        self.tables
            .lock()
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("room {}", room_id)))
    }

    async fn load_map(&self, map_id: Uuid) -> Result<MapRecord, RepositoryError> {
        self.tables
            .lock()
            .maps
            .get(&map_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("map {}", map_id)))
    }

    async fn load_participants(&self, room_id: RoomId) -> Result<Vec<DiffRecord>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .participants
            .get(&room_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_participant(
        &self,
        room_id: RoomId,
        record: &DiffRecord,
    ) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable);
        }
        let mut tables = self.tables.lock();
        tables
            .participants
            .entry(room_id)
            .or_default()
            .insert(record.user_id, record.clone());
        tables.writes += 1;
        Ok(())
    }
}
