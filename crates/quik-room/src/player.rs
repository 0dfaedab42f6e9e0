//! The player record owned by a [`TurnCycle`](crate::TurnCycle).

use quik_protocol::{PlayerId, PlayerView};

/// A player in a room.
///
/// Only the turn cycle creates, mutates and destroys these; everyone else
/// gets `&Player` or a [`PlayerView`] copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub(crate) id: PlayerId,
    pub(crate) name: String,
    pub(crate) connected: bool,
    /// Only meaningful while a round is active.
    pub(crate) eliminated: bool,
    pub(crate) win_count: u32,
    pub(crate) is_turn: bool,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            connected: true,
            eliminated: false,
            win_count: 0,
            is_turn: false,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    /// Round wins in the current game.
    pub fn win_count(&self) -> u32 {
        self.win_count
    }

    /// `true` iff this player holds the turn in the active round.
    pub fn is_turn(&self) -> bool {
        self.is_turn
    }

    /// Snapshot for broadcasting.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            is_turn: self.is_turn,
            eliminated: self.eliminated,
            win_count: self.win_count,
            connected: self.connected,
        }
    }
}
