//! Narrow persistence interface for room, map and participant records.

use async_trait::async_trait;
use room_core::{geometry::Cell, DiffRecord, EngineId, RoomId, RoomMap};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod pg;

pub use memory::MemoryRoomRepository;
pub use pg::PgRoomRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Storage unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: RoomId,
    pub map_id: Uuid,
    pub engine_id: Option<EngineId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRecord {
    pub id: Uuid,
    pub width: i32,
    pub height: i32,
    pub spawn: Cell,
    pub blocked: Vec<Cell>,
}

impl MapRecord {
    pub fn to_room_map(&self) -> RoomMap {
        RoomMap::open(self.width, self.height)
            .with_spawn(self.spawn)
            .with_blocked(self.blocked.iter().copied())
    }
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn load_room(&self, room_id: RoomId) -> Result<RoomRecord, RepositoryError>;

    async fn load_map(&self, map_id: Uuid) -> Result<MapRecord, RepositoryError>;

    async fn load_participants(&self, room_id: RoomId) -> Result<Vec<DiffRecord>, RepositoryError>;

    /// Idempotent by (room, user).
    async fn upsert_participant(
        &self,
        room_id: RoomId,
        record: &DiffRecord,
    ) -> Result<(), RepositoryError>;
}
