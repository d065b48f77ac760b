use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Direction, Position, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: UserId,
    pub position: Position,
    pub direction: Direction,
    pub last_moved_at: Option<Instant>,
    pub active: bool,
}

impl Participant {
    pub fn new(user_id: UserId, position: Position, direction: Direction) -> Self {
        Self {
            user_id,
            position,
            direction,
            last_moved_at: None,
            active: true,
        }
    }

    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            user_id: self.user_id,
            position: self.position,
            direction: self.direction,
        }
    }

    pub fn diff_record(&self) -> DiffRecord {
        DiffRecord {
            user_id: self.user_id,
            position: self.position,
            direction: self.direction,
            active: self.active,
        }
    }
}

/// What other clients get to see of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub position: Position,
    pub direction: Direction,
}

/// Latest persisted shape of one participant. Upserted by (room, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub position: Position,
    pub direction: Direction,
    pub active: bool,
}

impl From<DiffRecord> for Participant {
    fn from(record: DiffRecord) -> Self {
        Participant {
            user_id: record.user_id,
            position: record.position,
            direction: record.direction,
            last_moved_at: None,
            active: record.active,
        }
    }
}
