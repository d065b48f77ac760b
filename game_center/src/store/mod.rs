//! Persisted room ownership (`rooms.engine_id`).

use async_trait::async_trait;
use room_core::{EngineId, RoomId};

use crate::scheduler::SchedulerError;

pub mod memory;
pub mod pg;

pub use memory::MemoryOwnershipStore;
pub use pg::PgOwnershipStore;

#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Every known room with its current owner, if any.
    async fn load_assignments(&self) -> Result<Vec<(RoomId, Option<EngineId>)>, SchedulerError>;

    async fn set_owner(&self, room_id: RoomId, engine_id: Option<EngineId>)
        -> Result<(), SchedulerError>;
}
