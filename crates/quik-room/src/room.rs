//! The room orchestrator.
//!
//! [`Room`] ties a [`TurnCycle`], a [`CountdownTimer`] and the room-level
//! state (lock flag, used letters, category) together. It is the only way
//! anything outside this crate mutates a room.
//!
//! # Turn slots
//!
//! Every change of turn holder opens a new [`TurnSlot`], and so does every
//! countdown start. A countdown's expiry only counts if the slot it opened
//! is still current when the expiry is processed. A manual end of turn or
//! a restarted countdown that lands first moves the slot on, so the late
//! expiry becomes a no-op instead of eliminating a player.

use quik_protocol::{PlayerId, PlayerView, RoomId, UsedLetters};
use quik_timer::{CountdownTimer, TickSink, TimerState};
use tracing::{debug, info, warn};

use crate::ledger::settle;
use crate::{
    ActiveMembers, Category, Player, Resolution, RoomConfig, RoomError, TurnCycle,
    select_category,
};

/// Identifies one turn within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnSlot(pub u64);

/// Result of a countdown expiry that eliminated the turn holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination {
    /// The eliminated player as they were right after elimination.
    pub eliminated: PlayerView,
    /// Set when the elimination ended the round.
    pub resolution: Option<Resolution>,
}

/// One game room.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    config: RoomConfig,
    cycle: TurnCycle,
    timer: CountdownTimer,
    locked: bool,
    used_letters: UsedLetters,
    category: Option<Category>,
    slot: TurnSlot,
}

impl Room {
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            cycle: TurnCycle::with_win_threshold(config.win_threshold),
            timer: CountdownTimer::new(config.timer_config()),
            id,
            config,
            locked: false,
            used_letters: UsedLetters::new(),
            category: None,
            slot: TurnSlot(0),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Lock
    // -----------------------------------------------------------------------

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Stops new players from joining. Idempotent.
    pub fn lock(&mut self) {
        if !self.locked {
            self.locked = true;
            info!(room_id = %self.id, "room locked");
        }
    }

    /// Reopens the room to new players.
    ///
    /// # Errors
    /// [`RoomError::InvalidState`] while a countdown is running.
    pub fn unlock(&mut self) -> Result<(), RoomError> {
        if self.timer.is_running() {
            return Err(RoomError::InvalidState(
                "cannot unlock while a turn countdown is running".into(),
            ));
        }
        if self.locked {
            self.locked = false;
            info!(room_id = %self.id, "room unlocked");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Adds a player. They take part from the next round on.
    ///
    /// # Errors
    /// [`RoomError::RoomLocked`] if the room is locked,
    /// [`RoomError::AlreadyInRoom`] if the id is taken.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>) -> Result<(), RoomError> {
        if self.locked {
            warn!(room_id = %self.id, player_id = %id, "join refused, room locked");
            return Err(RoomError::RoomLocked(self.id.clone()));
        }
        if !self.cycle.add_player(id.clone(), name) {
            return Err(RoomError::AlreadyInRoom(id, self.id.clone()));
        }
        info!(
            room_id = %self.id,
            player_id = %id,
            players = self.cycle.len(),
            "player joined"
        );
        Ok(())
    }

    /// Removes a player for good.
    ///
    /// If that leaves a single player in the active round, the round is
    /// resolved and the outcome returned. A room left with one player is
    /// unlocked; an empty room has its countdown stopped.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] for unknown ids.
    pub fn remove_player(&mut self, id: &PlayerId) -> Result<Option<Resolution>, RoomError> {
        let held_turn = self.holds_turn(id);
        let removed = self
            .cycle
            .remove_player(id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))?;
        info!(
            room_id = %self.id,
            player_id = %id,
            players = self.cycle.len(),
            "player left"
        );

        let resolution = self.after_departure(held_turn, removed.round_winner);

        match self.cycle.len() {
            0 => {
                self.timer.reset();
            }
            1 => {
                // Only refused while a countdown runs, which a lone player
                // can't have after the round above resolved.
                if let Err(e) = self.unlock() {
                    debug!(room_id = %self.id, error = %e, "room stays locked");
                }
            }
            _ => {}
        }
        Ok(resolution)
    }

    /// Marks a player disconnected; during a round this eliminates them.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] for unknown ids.
    pub fn disconnect(&mut self, id: &PlayerId) -> Result<Option<Resolution>, RoomError> {
        if !self.cycle.contains(id) {
            return Err(RoomError::PlayerNotFound(id.clone()));
        }
        let held_turn = self.holds_turn(id);
        let round_winner = self.cycle.handle_disconnect(id);
        info!(room_id = %self.id, player_id = %id, "player disconnected");
        Ok(self.after_departure(held_turn, round_winner))
    }

    /// Marks a disconnected player connected again. Allowed on a locked
    /// room; the player sits out any round already running.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] for unknown ids.
    pub fn reconnect(&mut self, id: &PlayerId) -> Result<(), RoomError> {
        if !self.cycle.handle_reconnect(id) {
            return Err(RoomError::PlayerNotFound(id.clone()));
        }
        info!(room_id = %self.id, player_id = %id, "player reconnected");
        Ok(())
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.cycle.get(id)
    }

    /// All players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.cycle.players()
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.cycle.players().map(Player::view).collect()
    }

    pub fn player_count(&self) -> usize {
        self.cycle.len()
    }

    pub fn connected_count(&self) -> usize {
        self.cycle.connected_count()
    }

    // -----------------------------------------------------------------------
    // Rounds and turns
    // -----------------------------------------------------------------------

    /// Locks the room and starts a round with every connected player.
    /// Clears used letters and picks the round's category.
    ///
    /// # Errors
    /// [`RoomError::InvalidState`] if a round is already active,
    /// [`RoomError::InsufficientPlayers`] with too few connected players.
    pub fn start_round(&mut self) -> Result<Category, RoomError> {
        if self.cycle.round_active() {
            return Err(RoomError::InvalidState("a round is already in progress".into()));
        }
        let connected = self.cycle.connected_count();
        let required = self.config.min_players.max(2);
        if connected < required {
            return Err(RoomError::InsufficientPlayers {
                required,
                connected,
            });
        }

        self.lock();
        if !self.cycle.start_round() {
            return Err(RoomError::InsufficientPlayers {
                required,
                connected,
            });
        }
        self.timer.reset();
        self.used_letters.clear();
        let category = Self::select_category();
        self.category = Some(category);
        self.next_slot();
        info!(
            room_id = %self.id,
            category = category.name,
            difficulty = %category.difficulty,
            "round started"
        );
        Ok(category)
    }

    /// Draws a random category. Does not touch room state.
    pub fn select_category() -> Category {
        select_category()
    }

    /// Category of the current (or last) round.
    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// The current turn holder passes the turn on.
    ///
    /// Stops the countdown, moves to the next player and, if given, marks
    /// the letter they played as no longer selectable.
    ///
    /// # Errors
    /// [`RoomError::InvalidState`] without an active round,
    /// [`RoomError::NotYourTurn`] if `player` doesn't hold the turn.
    pub fn end_turn(
        &mut self,
        player: &PlayerId,
        selected_letter: Option<char>,
    ) -> Result<(), RoomError> {
        if !self.cycle.round_active() {
            return Err(RoomError::InvalidState("no round in progress".into()));
        }
        if !self.holds_turn(player) {
            return Err(RoomError::NotYourTurn(player.clone()));
        }

        self.timer.reset();
        self.cycle.advance_turn();
        self.next_slot();
        if let Some(letter) = selected_letter {
            self.set_letter_unselectable(letter);
        }
        debug!(
            room_id = %self.id,
            from = %player,
            to = ?self.cycle.current_player().map(Player::id),
            "turn ended"
        );
        Ok(())
    }

    /// Handles a countdown expiry for `slot`.
    ///
    /// Eliminates the turn holder, which passes the turn to their
    /// successor, and settles the round if only one player is left. The
    /// next countdown is left for the caller to start. Returns `None` when
    /// the slot is stale or no round is active.
    pub fn on_timer_expiry(&mut self, slot: TurnSlot) -> Option<Elimination> {
        if slot != self.slot || !self.cycle.round_active() {
            debug!(room_id = %self.id, ?slot, current = ?self.slot, "stale expiry ignored");
            return None;
        }
        let holder = self.cycle.current_player()?.id().clone();
        // No countdown may outlive the holder it was started for.
        self.timer.reset();

        let round_winner = self.cycle.eliminate(&holder);
        let eliminated = self.cycle.get(&holder)?.view();
        self.next_slot();
        info!(room_id = %self.id, player_id = %holder, "turn holder timed out");

        let resolution = round_winner.and_then(|winner| self.finish_round(&winner));
        Some(Elimination {
            eliminated,
            resolution,
        })
    }

    pub fn round_active(&self) -> bool {
        self.cycle.round_active()
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.cycle.current_player()
    }

    pub fn active_members(&self) -> ActiveMembers<'_> {
        self.cycle.active_members()
    }

    pub fn game_winner(&self) -> Option<&Player> {
        self.cycle.game_winner()
    }

    /// Read access to the turn cycle.
    pub fn cycle(&self) -> &TurnCycle {
        &self.cycle
    }

    pub fn slot(&self) -> TurnSlot {
        self.slot
    }

    // -----------------------------------------------------------------------
    // Countdown
    // -----------------------------------------------------------------------

    /// Starts the countdown for the current turn under a new slot.
    ///
    /// `on_expiry` receives that slot; feed it back into
    /// [`on_timer_expiry`](Self::on_timer_expiry). Expiries of earlier
    /// countdowns are stale from now on.
    ///
    /// # Errors
    /// [`RoomError::Timer`] if a countdown is already running,
    /// [`RoomError::InvalidState`] without an active round.
    pub fn start_timer<S, F>(&mut self, sink: S, on_expiry: F) -> Result<TurnSlot, RoomError>
    where
        S: TickSink,
        F: FnOnce(TurnSlot) + Send + 'static,
    {
        if !self.cycle.round_active() {
            return Err(RoomError::InvalidState("no round in progress".into()));
        }
        let slot = TurnSlot(self.slot.0 + 1);
        self.timer.start(sink, move || on_expiry(slot))?;
        self.slot = slot;
        Ok(slot)
    }

    /// Stops the countdown. Returns `true` if one was running.
    pub fn reset_timer(&mut self) -> bool {
        self.timer.reset()
    }

    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    // -----------------------------------------------------------------------
    // Used letters
    // -----------------------------------------------------------------------

    pub fn used_letters(&self) -> &UsedLetters {
        &self.used_letters
    }

    /// Marks a letter selected. A letter that is already selected is
    /// dropped and re-inserted, so it ends up selected either way.
    pub fn toggle_used_letter(&mut self, letter: char) {
        if self.used_letters.get(&letter) == Some(&true) {
            self.remove_used_letter(letter);
        }
        self.used_letters.insert(letter, true);
    }

    /// Forgets a letter entirely.
    pub fn remove_used_letter(&mut self, letter: char) {
        self.used_letters.remove(&letter);
    }

    /// Keeps a touched letter's entry but marks it not selected. Untouched
    /// letters are left alone.
    pub fn set_letter_unselectable(&mut self, letter: char) {
        if let Some(selected) = self.used_letters.get_mut(&letter) {
            *selected = false;
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn holds_turn(&self, id: &PlayerId) -> bool {
        self.cycle.current_player().is_some_and(|p| p.id() == id)
    }

    fn next_slot(&mut self) {
        self.slot = TurnSlot(self.slot.0 + 1);
    }

    /// Common tail of disconnect and removal: a departing turn holder ends
    /// the turn, a departure down to one player ends the round.
    fn after_departure(
        &mut self,
        held_turn: bool,
        round_winner: Option<PlayerId>,
    ) -> Option<Resolution> {
        if held_turn {
            self.timer.reset();
            self.next_slot();
        }
        round_winner.and_then(|winner| self.finish_round(&winner))
    }

    fn finish_round(&mut self, winner: &PlayerId) -> Option<Resolution> {
        self.timer.reset();
        self.used_letters.clear();
        let resolution = settle(&mut self.cycle, winner)?;
        info!(
            room_id = %self.id,
            player_id = %resolution.winner().id,
            game_over = resolution.is_game_over(),
            "round resolved"
        );
        Some(resolution)
    }
}
