use thiserror::Error;

use crate::UserId;

/// Rejection of a single action against a room. These are expected and
/// frequent; callers drop the action and keep going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("participant {0} not found")]
    NotFound(UserId),
    #[error("participant {0} is not active")]
    NotActive(UserId),
    #[error("participant {0} is already active")]
    AlreadyActive(UserId),
    #[error("participant {0} moved too recently")]
    TooSoon(UserId),
    #[error("cell ({0}, {1}) is blocked")]
    Blocked(i32, i32),
    #[error("cell ({0}, {1}) is out of bounds")]
    OutOfBounds(i32, i32),
    #[error("cell ({0}, {1}) is occupied")]
    Occupied(i32, i32),
    #[error("position did not change")]
    Unchanged,
    #[error("no free cell left in room")]
    NoFreeCell,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("cannot revert {requested} actions, only {available} retained")]
    HistoryExhausted { requested: u64, available: usize },
    #[error("version {requested} is ahead of current version {current}")]
    FutureVersion { requested: u64, current: u64 },
}

impl RoomError {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "not_found",
            RoomError::NotActive(_) => "not_active",
            RoomError::AlreadyActive(_) => "already_active",
            RoomError::TooSoon(_) => "too_soon",
            RoomError::Blocked(..) => "blocked",
            RoomError::OutOfBounds(..) => "out_of_bounds",
            RoomError::Occupied(..) => "occupied",
            RoomError::Unchanged => "unchanged",
            RoomError::NoFreeCell => "no_free_cell",
            RoomError::InvalidAction(_) => "invalid_action",
            RoomError::HistoryExhausted { .. } => "history_exhausted",
            RoomError::FutureVersion { .. } => "future_version",
        }
    }
}
