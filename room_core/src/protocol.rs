//! JSON payloads carried on the message bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ActionType, EngineId, ParticipantView, RoomId, RoomMap, UserId};

// --- client -> engine ---

/// Published on `room.action.<roomID>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

// --- engine -> router ---

/// Published on `room.result.<roomID>`. `id` is the room version after the
/// action was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub id: u64,
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(rename = "onlyOwner")]
    pub only_owner: bool,
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapView {
    pub width: i32,
    pub height: i32,
    pub blocked: Vec<CellView>,
}

impl From<&RoomMap> for MapView {
    fn from(map: &RoomMap) -> Self {
        Self {
            width: map.width,
            height: map.height,
            blocked: map
                .blocked_sorted()
                .into_iter()
                .map(|(x, y)| CellView { x, y })
                .collect(),
        }
    }
}

/// Value of an `init` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitValue {
    pub version: u64,
    pub participants: Vec<ParticipantView>,
    pub map: MapView,
}

// --- engine -> scheduler ---

/// Published on `engine.heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(rename = "engineID")]
    pub engine_id: EngineId,
    #[serde(rename = "isFirstPing")]
    pub is_first_ping: bool,
    /// Rooms currently hosted. `None` skips reconciliation on the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<RoomId>>,
}

/// Published on `room.opened.<roomID>` when a processor takes a room over.
/// Versions restart on every takeover, so earlier snapshots are void.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOpened {
    #[serde(rename = "engineID")]
    pub engine_id: EngineId,
    pub version: u64,
}

// --- scheduler -> engine ---

/// Published on `engine.assign.<engineID>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssignCommand {
    Start {
        #[serde(rename = "roomID")]
        room_id: RoomId,
    },
    Stop {
        #[serde(rename = "roomID")]
        room_id: RoomId,
    },
}

impl AssignCommand {
    pub fn room_id(&self) -> RoomId {
        match self {
            AssignCommand::Start { room_id } | AssignCommand::Stop { room_id } => *room_id,
        }
    }
}

// --- collaborator -> scheduler ---

/// Published on `room.created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCreated {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

/// Published on `room.deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDeleted {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn assign_command_is_tagged_by_type() {
        let room_id = Uuid::new_v4();
        let encoded = serde_json::to_value(AssignCommand::Start { room_id }).unwrap();
        assert_eq!(encoded, json!({ "type": "start", "roomID": room_id }));

        let decoded: AssignCommand =
            serde_json::from_value(json!({ "type": "stop", "roomID": room_id })).unwrap();
        assert_eq!(decoded, AssignCommand::Stop { room_id });
    }

    #[test]
    fn heartbeat_without_rooms_decodes() {
        let decoded: Heartbeat =
            serde_json::from_value(json!({ "engineID": "e1", "isFirstPing": true })).unwrap();
        assert_eq!(decoded.engine_id, "e1");
        assert!(decoded.is_first_ping);
        assert!(decoded.rooms.is_none());
    }

    #[test]
    fn result_uses_wire_field_names() {
        let user_id = Uuid::new_v4();
        let result = ActionResult {
            id: 3,
            user_id,
            only_owner: false,
            kind: ActionType::Exit,
            value: json!({}),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "id": 3, "userID": user_id, "onlyOwner": false, "type": "exit", "value": {} })
        );
    }
}
