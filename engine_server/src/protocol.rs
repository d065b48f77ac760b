//! Frames exchanged with WebSocket clients.

use room_core::{protocol::MapView, Action, Direction, Snapshot, UserId};
use serde::{Deserialize, Serialize};

/// Frames the server writes besides plain action results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Room geometry, sent once per connection.
    Map { value: MapView },
    /// Starting view; later results with a greater id apply on top of it.
    Snapshot { id: u64, value: Snapshot },
    Error { message: String },
}

impl ServerFrame {
    pub fn to_text(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MoveValue {
    pub direction: Direction,
}

/// What a connected client may send. The acting user always comes from the
/// connection, never from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Move { value: MoveValue },
    Exit,
}

impl ClientFrame {
    pub fn into_action(self, user_id: UserId) -> Action {
        match self {
            ClientFrame::Move { value } => Action::Move {
                user_id,
                direction: value.direction,
            },
            ClientFrame::Exit => Action::Exit { user_id },
        }
    }
}
