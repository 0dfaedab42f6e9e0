//! Turn rotation and elimination.
//!
//! [`TurnCycle`] owns every player record in a room plus the rotation of
//! players still in the current round. The rotation is circular: advancing
//! past the last member wraps to the first. It is stored as a compact list
//! of ids with a cursor, so removing a member is a splice that shifts the
//! cursor instead of relinking nodes.
//!
//! ```text
//! rotation: [A, B, C, D]     current = 2 (C holds the turn)
//! eliminate(B)  → [A, C, D]  current = 1 (still C)
//! eliminate(C)  → [A, D]     current = 1 (D, C's successor)
//! eliminate(D)  → [A]        round resolves: A wins, rotation cleared
//! ```
//!
//! Invariant: while a round is active the rotation holds at least two
//! players. The call that brings it down to one resolves the round before
//! returning.

use std::collections::HashMap;

use quik_protocol::PlayerId;
use tracing::{debug, info};

use crate::{DEFAULT_WIN_THRESHOLD, Player};

/// A player removed from the room with [`TurnCycle::remove_player`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    /// The record as it was at removal.
    pub player: Player,
    /// Set when the removal left a single player in the rotation.
    pub round_winner: Option<PlayerId>,
}

/// Players of one room and the turn order of its active round.
#[derive(Debug, Clone)]
pub struct TurnCycle {
    players: HashMap<PlayerId, Player>,
    /// Insertion order; rotations are built in this order.
    join_order: Vec<PlayerId>,
    rotation: Vec<PlayerId>,
    /// Index into `rotation` of the turn holder. Meaningless when empty.
    current: usize,
    round_active: bool,
    round_winner: Option<PlayerId>,
    win_threshold: u32,
}

impl TurnCycle {
    pub fn new() -> Self {
        Self::with_win_threshold(DEFAULT_WIN_THRESHOLD)
    }

    pub fn with_win_threshold(win_threshold: u32) -> Self {
        Self {
            players: HashMap::new(),
            join_order: Vec::new(),
            rotation: Vec::new(),
            current: 0,
            round_active: false,
            round_winner: None,
            win_threshold,
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a connected player outside of any rotation. Returns `false` if
    /// the id is already taken.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        self.join_order.push(id.clone());
        self.players.insert(id.clone(), Player::new(id, name.into()));
        true
    }

    /// Deletes a player's record, splicing them out of the rotation first.
    ///
    /// Same single-survivor rule as [`eliminate`](Self::eliminate). Returns
    /// `None` for unknown ids.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Removed> {
        if !self.players.contains_key(id) {
            return None;
        }
        let round_winner = if self.round_active {
            self.splice_out(id)
        } else {
            None
        };
        self.join_order.retain(|p| p != id);
        let player = self.players.remove(id)?;
        debug!(player_id = %id, "player record removed");
        Some(Removed {
            player,
            round_winner,
        })
    }

    /// Marks a player disconnected. During an active round this eliminates
    /// them; returns the round winner if that ended the round.
    pub fn handle_disconnect(&mut self, id: &PlayerId) -> Option<PlayerId> {
        let player = self.players.get_mut(id)?;
        player.connected = false;
        if self.round_active {
            self.eliminate(id)
        } else {
            None
        }
    }

    /// Marks a player connected again. They sit out the active round and
    /// take part from the next one. Returns `false` for unknown ids.
    pub fn handle_reconnect(&mut self, id: &PlayerId) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.connected = true;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// All players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.join_order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    /// Starts a round with every connected player, in join order, the first
    /// of them holding the turn.
    ///
    /// Does nothing and returns `false` with fewer than two connected
    /// players.
    pub fn start_round(&mut self) -> bool {
        let members: Vec<PlayerId> = self
            .join_order
            .iter()
            .filter(|id| self.players.get(*id).is_some_and(|p| p.connected))
            .cloned()
            .collect();
        if members.len() < 2 {
            return false;
        }

        for id in &members {
            if let Some(player) = self.players.get_mut(id) {
                player.eliminated = false;
            }
        }
        self.rotation = members;
        self.current = 0;
        self.round_active = true;
        self.round_winner = None;
        self.refresh_turn_flags();

        info!(members = self.rotation.len(), "round started");
        true
    }

    /// The turn holder, or `None` when no round is active.
    pub fn current_player(&self) -> Option<&Player> {
        self.rotation
            .get(self.current)
            .and_then(|id| self.players.get(id))
    }

    /// Passes the turn to the next member of the rotation.
    pub fn advance_turn(&mut self) {
        if self.rotation.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.rotation.len();
        self.refresh_turn_flags();
    }

    /// Eliminates a player from the active round.
    ///
    /// No-op unless a round is active and the player is in its rotation. If
    /// the player held the turn it passes to their successor. When only one
    /// member is left the round resolves in this same call: that member is
    /// recorded as round winner, gains a win, and their id is returned.
    pub fn eliminate(&mut self, id: &PlayerId) -> Option<PlayerId> {
        if !self.round_active || !self.rotation.contains(id) {
            return None;
        }
        if let Some(player) = self.players.get_mut(id) {
            player.eliminated = true;
        }
        debug!(player_id = %id, "player eliminated");
        self.splice_out(id)
    }

    pub fn round_active(&self) -> bool {
        self.round_active
    }

    /// Winner of the round that just resolved. Cleared by the next
    /// [`start_round`](Self::start_round).
    pub fn round_winner(&self) -> Option<&Player> {
        self.round_winner.as_ref().and_then(|id| self.players.get(id))
    }

    /// Rotation members in turn order, starting with the turn holder.
    ///
    /// Empty when no round is active. The iterator is cheap to clone, so
    /// the sequence can be walked again from the start.
    pub fn active_members(&self) -> ActiveMembers<'_> {
        ActiveMembers {
            cycle: self,
            offset: 0,
        }
    }

    /// Ids of the rotation in stored order (not starting at the holder).
    pub fn rotation(&self) -> &[PlayerId] {
        &self.rotation
    }

    /// The first player (in join order) to reach the win threshold.
    pub fn game_winner(&self) -> Option<&Player> {
        self.players().find(|p| p.win_count >= self.win_threshold)
    }

    pub fn win_threshold(&self) -> u32 {
        self.win_threshold
    }

    pub(crate) fn clear_eliminations(&mut self) {
        for player in self.players.values_mut() {
            player.eliminated = false;
        }
    }

    pub(crate) fn clear_win_counts(&mut self) {
        for player in self.players.values_mut() {
            player.win_count = 0;
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Removes `id` from the rotation, keeping the cursor on the same holder
    /// (or on the removed holder's successor), and resolves the round if one
    /// member remains.
    fn splice_out(&mut self, id: &PlayerId) -> Option<PlayerId> {
        let pos = self.rotation.iter().position(|m| m == id)?;
        self.rotation.remove(pos);
        if pos < self.current {
            self.current -= 1;
        }
        if self.current >= self.rotation.len() {
            self.current = 0;
        }

        let winner = if self.rotation.len() == 1 {
            self.resolve_round()
        } else {
            None
        };
        self.refresh_turn_flags();
        winner
    }

    fn resolve_round(&mut self) -> Option<PlayerId> {
        let winner = self.rotation.pop()?;
        self.rotation.clear();
        self.current = 0;
        self.round_active = false;
        if let Some(player) = self.players.get_mut(&winner) {
            player.win_count += 1;
            info!(
                player_id = %winner,
                wins = player.win_count,
                "round won"
            );
        }
        self.round_winner = Some(winner.clone());
        Some(winner)
    }

    fn refresh_turn_flags(&mut self) {
        let holder = self.rotation.get(self.current).cloned();
        for player in self.players.values_mut() {
            player.is_turn = holder.as_ref() == Some(&player.id);
        }
    }
}

impl Default for TurnCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`TurnCycle::active_members`].
#[derive(Debug, Clone)]
pub struct ActiveMembers<'a> {
    cycle: &'a TurnCycle,
    offset: usize,
}

impl<'a> Iterator for ActiveMembers<'a> {
    type Item = &'a Player;

    fn next(&mut self) -> Option<Self::Item> {
        let rotation = &self.cycle.rotation;
        if self.offset >= rotation.len() {
            return None;
        }
        let index = (self.cycle.current + self.offset) % rotation.len();
        self.offset += 1;
        self.cycle.players.get(&rotation[index])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.cycle.rotation.len().saturating_sub(self.offset);
        (0, Some(left))
    }
}
