//! Authoritative per-room simulation.
//!
//! A [`RoomState`] holds one room's world (grid, blocked cells, participants) and
//! applies one [`Action`] at a time. Everything in this crate is synchronous and
//! lock-free: callers guarantee that a room is only ever driven by one owner.

use uuid::Uuid;

pub mod action;
pub mod error;
pub mod geometry;
pub mod participant;
pub mod protocol;
pub mod state;

pub use action::{Action, ActionType};
pub use error::RoomError;
pub use geometry::{Direction, Position, RoomMap};
pub use participant::{DiffRecord, Participant, ParticipantView};
pub use state::{RoomState, Snapshot};

pub type RoomId = Uuid;
pub type UserId = Uuid;
pub type EngineId = String;
