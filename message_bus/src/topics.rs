use room_core::RoomId;
use uuid::Uuid;

pub const ROOM_ACTION_PREFIX: &str = "room.action.";
pub const ROOM_RESULT_PREFIX: &str = "room.result.";
pub const ENGINE_ASSIGN_PREFIX: &str = "engine.assign.";
/// Announced by a processor once it owns a room, so hubs resynchronize.
pub const ROOM_OPENED_PREFIX: &str = "room.opened.";

pub const ROOM_ACTION_PATTERN: &str = "room.action.*";
pub const ROOM_RESULT_PATTERN: &str = "room.result.*";
pub const ROOM_OPENED_PATTERN: &str = "room.opened.*";

pub const ENGINE_HEARTBEAT: &str = "engine.heartbeat";
pub const ROOM_CREATED: &str = "room.created";
pub const ROOM_DELETED: &str = "room.deleted";

pub fn room_action(room_id: RoomId) -> String {
    format!("{}{}", ROOM_ACTION_PREFIX, room_id)
}

pub fn room_result(room_id: RoomId) -> String {
    format!("{}{}", ROOM_RESULT_PREFIX, room_id)
}

pub fn room_opened(room_id: RoomId) -> String {
    format!("{}{}", ROOM_OPENED_PREFIX, room_id)
}

pub fn engine_assign(engine_id: &str) -> String {
    format!("{}{}", ENGINE_ASSIGN_PREFIX, engine_id)
}

/// Room id addressed by a keyed topic such as `room.action.<id>`.
pub fn room_from_topic(prefix: &str, topic: &str) -> Option<RoomId> {
    topic
        .strip_prefix(prefix)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Redis-style glob match, limited to a single trailing `*`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_round_trips_through_topic() {
        let room_id = Uuid::new_v4();
        assert_eq!(
            room_from_topic(ROOM_ACTION_PREFIX, &room_action(room_id)),
            Some(room_id)
        );
        assert_eq!(room_from_topic(ROOM_RESULT_PREFIX, &room_action(room_id)), None);
        assert_eq!(room_from_topic(ROOM_ACTION_PREFIX, "room.action.nope"), None);
    }

    #[test]
    fn glob_matching() {
        assert!(matches(ROOM_ACTION_PATTERN, "room.action.abc"));
        assert!(!matches(ROOM_ACTION_PATTERN, "room.result.abc"));
        assert!(matches(ROOM_OPENED_PATTERN, &room_opened(Uuid::new_v4())));
        assert!(matches(ENGINE_HEARTBEAT, "engine.heartbeat"));
        assert!(!matches(ENGINE_HEARTBEAT, "engine.heartbeat.x"));
    }
}
