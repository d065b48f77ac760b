use actix::Message;
use room_core::{protocol::ActionResult, RoomId, UserId};

use super::{ClientReceiver, HubError};

#[derive(Message)]
#[rtype(result = "Result<ClientReceiver, HubError>")]
pub struct Register {
    pub room_id: RoomId,
    pub client_id: UserId,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unregister {
    pub room_id: RoomId,
    pub client_id: UserId,
}

/// One result read from `room.result.<roomID>`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver {
    pub room_id: RoomId,
    pub result: ActionResult,
}

/// Read from `room.opened.<roomID>`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Resync {
    pub room_id: RoomId,
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct GetClientCount {
    pub room_id: RoomId,
}
