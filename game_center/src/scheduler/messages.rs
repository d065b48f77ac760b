use actix::Message;
use room_core::{protocol::Heartbeat, EngineId, RoomId};

use super::FleetView;

/// Heartbeat read from `engine.heartbeat`.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct HandleHeartbeat(pub Heartbeat);

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct HandleRoomCreated {
    pub room_id: RoomId,
}

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct HandleRoomDeleted {
    pub room_id: RoomId,
}

/// Runs one load-balance pass now, outside the periodic schedule.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct LoadBalance;

/// Runs one janitor pass now, outside the periodic schedule.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct Janitor;

/// A `start` command never made it onto the bus.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AssignmentFailed {
    pub room_id: RoomId,
    pub engine_id: EngineId,
}

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "FleetView")]
pub struct GetFleet;

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "bool")]
pub struct IsInitialized;

#[derive(Message)]
#[rtype(result = "String")]
pub struct GetDebugInfo;
