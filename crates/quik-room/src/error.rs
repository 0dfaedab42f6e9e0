//! Error types for the room layer.

use quik_protocol::{PlayerId, RoomId};
use quik_timer::TimerError;

/// Errors that can occur during room operations.
///
/// All of them are recoverable: the room is left exactly as it was before
/// the rejected call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room has been locked for play; no new players can join.
    #[error("room {0} is locked, new players cannot join")]
    RoomLocked(RoomId),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The player is not in this room (or in any room, for registry lookups).
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// The player is already in this room and connected.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// Countdown misuse, e.g. starting one while another is running.
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// A round needs more connected players than the room has.
    #[error("need at least {required} connected players to start a round, have {connected}")]
    InsufficientPlayers { required: usize, connected: usize },

    /// Only the player holding the turn may end it.
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    /// The room is in a state that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
