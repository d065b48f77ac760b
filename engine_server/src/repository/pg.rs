use async_trait::async_trait;
use room_core::{Direction, DiffRecord, Position, RoomId};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::{MapRecord, RepositoryError, RoomRecord, RoomRepository};

#[derive(Debug, FromRow)]
struct RoomRow {
    id: Uuid,
    map_id: Uuid,
    engine_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct MapRow {
    id: Uuid,
    width: i32,
    height: i32,
    spawn_x: i32,
    spawn_y: i32,
    blocked: Json<Vec<(i32, i32)>>,
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    user_id: Uuid,
    x: i32,
    y: i32,
    direction: String,
    active: bool,
}

impl TryFrom<ParticipantRow> for DiffRecord {
    type Error = RepositoryError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        let direction = row
            .direction
            .parse::<Direction>()
            .map_err(|e| RepositoryError::Corrupt(format!("participant {}: {}", row.user_id, e)))?;
        Ok(DiffRecord {
            user_id: row.user_id,
            position: Position::new(row.x, row.y),
            direction,
            active: row.active,
        })
    }
}

/// Postgres-backed repository. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn load_room(&self, room_id: RoomId) -> Result<RoomRecord, RepositoryError> {
        let row = sqlx::query_as::<_, RoomRow>("SELECT id, map_id, engine_id FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("room {}", room_id)))?;

        Ok(RoomRecord {
            id: row.id,
            map_id: row.map_id,
            engine_id: row.engine_id,
        })
    }

    async fn load_map(&self, map_id: Uuid) -> Result<MapRecord, RepositoryError> {
        let row = sqlx::query_as::<_, MapRow>(
            "SELECT id, width, height, spawn_x, spawn_y, blocked FROM maps WHERE id = $1",
        )
        .bind(map_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("map {}", map_id)))?;

        Ok(MapRecord {
            id: row.id,
            width: row.width,
            height: row.height,
            spawn: (row.spawn_x, row.spawn_y),
            blocked: row.blocked.0,
        })
    }

    async fn load_participants(&self, room_id: RoomId) -> Result<Vec<DiffRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT user_id, x, y, direction, active FROM room_participants WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DiffRecord::try_from).collect()
    }

    async fn upsert_participant(
        &self,
        room_id: RoomId,
        record: &DiffRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO room_participants (room_id, user_id, x, y, direction, active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (room_id, user_id) DO UPDATE
            SET x = EXCLUDED.x,
                y = EXCLUDED.y,
                direction = EXCLUDED.direction,
                active = EXCLUDED.active,
                updated_at = NOW()
            "#,
        )
        .bind(room_id)
        .bind(record.user_id)
        .bind(record.position.x)
        .bind(record.position.y)
        .bind(record.direction.as_str())
        .bind(record.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
