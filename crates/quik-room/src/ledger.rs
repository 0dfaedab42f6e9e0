//! Round and game outcomes.
//!
//! The turn cycle already decides *when* a round ends (the elimination
//! that leaves one player standing) and credits the survivor with a win.
//! This module decides what that win means for the game and performs the
//! bookkeeping that follows:
//!
//! - **round end**: elimination flags reset, win counts kept;
//! - **game end** (someone reached the win threshold): elimination flags
//!   and every win count reset, ready for a fresh game.
//!
//! Used letters and the countdown are room concerns; [`Room`](crate::Room)
//! clears those alongside.

use quik_protocol::{PlayerId, PlayerView};
use tracing::info;

use crate::TurnCycle;

/// Round wins needed to win a game.
pub const DEFAULT_WIN_THRESHOLD: u32 = 3;

/// How a resolved round ended.
///
/// Winner snapshots are taken before any reset, so a game winner reports
/// the win count that ended the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The round is over; the game goes on.
    RoundEnded { winner: PlayerView },
    /// This round win took a player to the threshold.
    GameEnded { winner: PlayerView },
}

impl Resolution {
    pub fn winner(&self) -> &PlayerView {
        match self {
            Self::RoundEnded { winner } | Self::GameEnded { winner } => winner,
        }
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self, Self::GameEnded { .. })
    }
}

/// Applies round-end or game-end resets after `cycle` resolved a round in
/// favour of `round_winner`.
///
/// Returns `None` if the winner's record is gone, which only happens when
/// the caller passes an id the cycle never resolved.
pub(crate) fn settle(cycle: &mut TurnCycle, round_winner: &PlayerId) -> Option<Resolution> {
    let winner = cycle.get(round_winner)?.view();

    let resolution = match cycle.game_winner().map(|p| p.view()) {
        Some(champion) => {
            info!(
                player_id = %champion.id,
                wins = champion.win_count,
                "game won"
            );
            cycle.clear_win_counts();
            Resolution::GameEnded { winner: champion }
        }
        None => Resolution::RoundEnded { winner },
    };
    cycle.clear_eliminations();
    Some(resolution)
}
