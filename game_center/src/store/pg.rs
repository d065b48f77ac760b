use async_trait::async_trait;
use room_core::{EngineId, RoomId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::OwnershipStore;
use crate::scheduler::SchedulerError;

#[derive(Debug, FromRow)]
struct OwnershipRow {
    id: Uuid,
    engine_id: Option<String>,
}

/// Reads and writes the `engine_id` column of the shared `rooms` table.
#[derive(Clone)]
pub struct PgOwnershipStore {
    pool: PgPool,
}

impl PgOwnershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnershipStore for PgOwnershipStore {
    async fn load_assignments(&self) -> Result<Vec<(RoomId, Option<EngineId>)>, SchedulerError> {
        let rows = sqlx::query_as::<_, OwnershipRow>("SELECT id, engine_id FROM rooms")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| (row.id, row.engine_id)).collect())
    }

    async fn set_owner(
        &self,
        room_id: RoomId,
        engine_id: Option<EngineId>,
    ) -> Result<(), SchedulerError> {
        let result = sqlx::query("UPDATE rooms SET engine_id = $2 WHERE id = $1")
            .bind(room_id)
            .bind(engine_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SchedulerError::UnknownRoom(room_id));
        }
        Ok(())
    }
}
