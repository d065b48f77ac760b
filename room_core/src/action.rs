use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    protocol::{ActionRequest, ActionResult, InitValue, MapView},
    Direction, RoomError, RoomState, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Move,
    Join,
    Exit,
    Init,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Move => "move",
            ActionType::Join => "join",
            ActionType::Exit => "exit",
            ActionType::Init => "init",
        }
    }
}

/// The closed set of things a client can ask a room to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Move { user_id: UserId, direction: Direction },
    Join { user_id: UserId },
    Exit { user_id: UserId },
    InitSnapshot { user_id: UserId },
}

#[derive(Deserialize)]
struct MoveValue {
    direction: Direction,
}

impl Action {
    /// Turns a decoded wire request into a typed action.
    pub fn parse(request: &ActionRequest) -> Result<Self, RoomError> {
        let user_id = request.user_id;
        match request.kind {
            ActionType::Move => {
                let value = MoveValue::deserialize(&request.value).map_err(|e| {
                    RoomError::InvalidAction(format!("move without direction: {}", e))
                })?;
                Ok(Action::Move {
                    user_id,
                    direction: value.direction,
                })
            }
            ActionType::Join => Ok(Action::Join { user_id }),
            ActionType::Exit => Ok(Action::Exit { user_id }),
            ActionType::Init => Ok(Action::InitSnapshot { user_id }),
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Action::Move { user_id, .. }
            | Action::Join { user_id }
            | Action::Exit { user_id }
            | Action::InitSnapshot { user_id } => *user_id,
        }
    }

    pub fn kind(&self) -> ActionType {
        match self {
            Action::Move { .. } => ActionType::Move,
            Action::Join { .. } => ActionType::Join,
            Action::Exit { .. } => ActionType::Exit,
            Action::InitSnapshot { .. } => ActionType::Init,
        }
    }

    /// Whether a successful apply can change room state.
    pub fn mutates(&self) -> bool {
        !matches!(self, Action::InitSnapshot { .. })
    }

    /// Snapshots go back to the requester only; everything else is broadcast.
    pub fn only_owner(&self) -> bool {
        matches!(self, Action::InitSnapshot { .. })
    }

    /// The wire request that would produce this action.
    pub fn to_request(&self) -> ActionRequest {
        let value = match self {
            Action::Move { direction, .. } => json!({ "direction": direction }),
            _ => Value::Null,
        };
        ActionRequest {
            user_id: self.user_id(),
            kind: self.kind(),
            value,
        }
    }

    /// Describes an applied action for subscribers. `version` is the id the
    /// apply returned.
    pub fn format(&self, state: &RoomState, version: u64) -> ActionResult {
        let user_id = self.user_id();
        let value = match self {
            Action::Move { .. } | Action::Join { .. } => match state.participant(&user_id) {
                Some(p) => {
                    let (cx, cy) = p.position.cell();
                    json!({
                        "position": p.position,
                        "cell": { "x": cx, "y": cy },
                        "direction": p.direction,
                    })
                }
                None => json!({}),
            },
            Action::Exit { .. } => json!({}),
            Action::InitSnapshot { .. } => {
                let snapshot = state.serialize();
                let init = InitValue {
                    version: snapshot.version,
                    participants: snapshot.participants,
                    map: MapView::from(state.map()),
                };
                serde_json::to_value(init).unwrap_or(Value::Null)
            }
        };

        ActionResult {
            id: version,
            user_id,
            only_owner: self.only_owner(),
            kind: self.kind(),
            value,
        }
    }
}
