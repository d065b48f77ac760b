use actix::Message;
use room_core::{RoomError, Snapshot};

/// One raw frame from `room.action.<roomID>`.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct ProcessAction {
    pub payload: String,
}

/// Writes pending diff records now instead of waiting for the interval.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct FlushDiff;

/// Stops intake, flushes what is left and stops the processor.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct StopRoom;

/// Current snapshot, or a historical one when `at` names an older version
/// still inside the history window.
#[derive(Message, Debug, Clone, Copy, Default)]
#[rtype(result = "Result<Snapshot, RoomError>")]
pub struct GetSnapshot {
    pub at: Option<u64>,
}
