use actix::Message;
use room_core::{protocol::AssignCommand, RoomId};

/// Start/stop command read from `engine.assign.<engineID>`.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct Assign(pub AssignCommand);

/// Raw action frame read from `room.action.<roomID>`.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct RouteAction {
    pub room_id: RoomId,
    pub payload: String,
}

/// Rooms this engine runs a processor for, sorted.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "Vec<RoomId>")]
pub struct GetHostedRooms;

/// Stops every processor; used on shutdown.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct StopAll;
