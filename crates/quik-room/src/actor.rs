//! Room actor: a Tokio task that owns one [`Room`].
//!
//! Commands arrive on a bounded mpsc channel and are answered over oneshot
//! reply channels. Countdown ticks and expiries come back from the timer
//! task on a second, unbounded channel, so the actor applies them in
//! between commands instead of the timer touching the room directly.
//!
//! The actor stops itself once the last player has left, or once nobody
//! has been connected for the room's idle timeout. Commands still queued at
//! that point are dropped, so their callers see [`RoomError::Unavailable`].

use std::collections::HashMap;

use quik_protocol::{PlayerId, PlayerView, RoomId, ServerEvent, UsedLetters};
use quik_timer::TimerState;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{Resolution, Room, RoomConfig, RoomError, TurnSlot};

/// Channel the actor pushes server events into, one per connected player.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Default command channel size for room actors.
pub(crate) const DEFAULT_CHANNEL_SIZE: usize = 64;

pub(crate) enum RoomCommand {
    /// Join, or reconnect if the id is known and disconnected.
    Join {
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<RoomInfo, RoomError>>,
    },

    /// Remove a player for good. Replies with the players left.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    /// Replies with the number of players still connected.
    Disconnect {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    /// Lock, start a round and start its first countdown.
    StartRound {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    SelectLetter {
        letter: char,
        prev_letter: Option<char>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    EndTurn {
        player_id: PlayerId,
        selected_letter: Option<char>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Stop any running countdown and start a fresh one for the current turn.
    RestartTimer {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Unlock {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Leave { .. } => "Leave",
            Self::Disconnect { .. } => "Disconnect",
            Self::StartRound { .. } => "StartRound",
            Self::SelectLetter { .. } => "SelectLetter",
            Self::EndTurn { .. } => "EndTurn",
            Self::RestartTimer { .. } => "RestartTimer",
            Self::Unlock { .. } => "Unlock",
            Self::GetInfo { .. } => "GetInfo",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Sent by the countdown task back to the actor.
#[derive(Debug)]
enum TimerSignal {
    Tick { countdown: u64, remaining: u32 },
    Expired { slot: TurnSlot },
}

/// A snapshot of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub locked: bool,
    pub round_active: bool,
    pub timer: TimerState,
    /// All players in join order.
    pub players: Vec<PlayerView>,
    pub used_letters: UsedLetters,
    pub current_player: Option<PlayerView>,
}

impl RoomInfo {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The `room-joined` event for this snapshot.
    pub fn joined_event(&self) -> ServerEvent {
        ServerEvent::RoomJoined {
            room_id: self.room_id.clone(),
            players: self.players.clone(),
            used_letters: self.used_letters.clone(),
            current_player: self.current_player.clone(),
            player_count: self.players.len(),
        }
    }
}

/// Handle to a running room actor.
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// `false` once the actor has stopped.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Joins the room, or reconnects a known player that had dropped.
    /// `sender` receives every event the room broadcasts from now on.
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<RoomInfo, RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a player. Returns how many players are left.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    /// Marks a player's connection lost. They keep their seat until the
    /// room goes idle. Returns how many players are still connected.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Disconnect { player_id, reply })
            .await?
    }

    pub async fn start_round(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartRound { reply }).await?
    }

    pub async fn select_letter(
        &self,
        letter: char,
        prev_letter: Option<char>,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SelectLetter {
            letter,
            prev_letter,
            reply,
        })
        .await?
    }

    pub async fn end_turn(
        &self,
        player_id: PlayerId,
        selected_letter: Option<char>,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::EndTurn {
            player_id,
            selected_letter,
            reply,
        })
        .await?
    }

    pub async fn restart_timer(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RestartTimer { reply })
            .await?
    }

    pub async fn unlock(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Unlock { reply }).await?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Tells the actor to stop. Any running countdown is cancelled.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

struct RoomActor {
    room: Room,
    senders: HashMap<PlayerId, PlayerSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    signal_tx: mpsc::UnboundedSender<TimerSignal>,
    signal_rx: mpsc::UnboundedReceiver<TimerSignal>,
    countdowns_started: u64,
    /// Countdown whose ticks are forwarded. Ticks from any other one are
    /// leftovers queued before a reset.
    live_countdown: Option<u64>,
    /// Since when nobody has been connected.
    idle_since: Option<Instant>,
    /// Set once the last player left; the actor stops after this command.
    closing: bool,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.id(), "room actor started");

        loop {
            let idle_deadline = self
                .idle_since
                .map(|since| since + self.room.config().idle_timeout);

            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(signal) = self.signal_rx.recv() => self.handle_signal(signal),
                _ = tokio::time::sleep_until(idle_deadline.unwrap_or_else(Instant::now)),
                    if idle_deadline.is_some() =>
                {
                    tracing::info!(room_id = %self.room.id(), "closing idle room");
                    break;
                }
            }

            if self.closing {
                tracing::info!(room_id = %self.room.id(), "last player left, closing room");
                break;
            }
            self.track_idle();
        }

        self.room.reset_timer();
        tracing::info!(room_id = %self.room.id(), "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        tracing::trace!(room_id = %self.room.id(), ?cmd, "command");
        let was_running = self.room.timer_state() == TimerState::Running;
        self.apply(cmd);
        if was_running && self.room.timer_state() == TimerState::Idle {
            self.live_countdown = None;
        }
    }

    fn apply(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player_id, name, sender));
            }
            RoomCommand::Leave { player_id, reply } => {
                let _ = reply.send(self.handle_leave(player_id));
            }
            RoomCommand::Disconnect { player_id, reply } => {
                let _ = reply.send(self.handle_disconnect(player_id));
            }
            RoomCommand::StartRound { reply } => {
                let _ = reply.send(self.handle_start_round());
            }
            RoomCommand::SelectLetter {
                letter,
                prev_letter,
                reply,
            } => {
                self.room.toggle_used_letter(letter);
                if let Some(prev) = prev_letter {
                    self.room.remove_used_letter(prev);
                }
                self.broadcast(ServerEvent::LetterSelected {
                    used_letters: self.room.used_letters().clone(),
                });
                let _ = reply.send(Ok(()));
            }
            RoomCommand::EndTurn {
                player_id,
                selected_letter,
                reply,
            } => {
                let result = self.room.end_turn(&player_id, selected_letter);
                if result.is_ok() {
                    self.broadcast_start_turn();
                }
                let _ = reply.send(result);
            }
            RoomCommand::RestartTimer { reply } => {
                self.room.reset_timer();
                let _ = reply.send(self.start_countdown().map(|_| ()));
            }
            RoomCommand::Unlock { reply } => {
                let _ = reply.send(self.room.unlock());
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<RoomInfo, RoomError> {
        match self.room.player(&player_id).map(|p| p.is_connected()) {
            Some(true) => {
                return Err(RoomError::AlreadyInRoom(
                    player_id,
                    self.room.id().clone(),
                ));
            }
            Some(false) => self.room.reconnect(&player_id)?,
            None => self.room.add_player(player_id.clone(), name)?,
        }
        self.senders.insert(player_id, sender);

        let info = self.info();
        self.broadcast(info.joined_event());
        Ok(info)
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        let was_holder = self.is_holder(&player_id);
        let resolution = self.room.remove_player(&player_id)?;
        self.senders.remove(&player_id);

        self.broadcast(ServerEvent::PlayerLeft {
            player_id: player_id.clone(),
        });
        self.after_departure(was_holder, resolution);

        let remaining = self.room.player_count();
        self.closing = remaining == 0;
        Ok(remaining)
    }

    fn handle_disconnect(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        let was_holder = self.is_holder(&player_id);
        let resolution = self.room.disconnect(&player_id)?;
        self.senders.remove(&player_id);

        self.broadcast(ServerEvent::Disconnected { player_id });
        self.after_departure(was_holder, resolution);
        Ok(self.room.connected_count())
    }

    /// Starts the idle clock when the last connected player is gone and
    /// stops it when someone is back.
    fn track_idle(&mut self) {
        if self.room.connected_count() > 0 {
            self.idle_since = None;
        } else if self.idle_since.is_none() {
            tracing::debug!(room_id = %self.room.id(), "room idle");
            self.idle_since = Some(Instant::now());
        }
    }

    fn after_departure(&mut self, was_holder: bool, resolution: Option<Resolution>) {
        match resolution {
            Some(resolution) => self.broadcast_resolution(resolution),
            None if was_holder && self.room.round_active() => self.broadcast_start_turn(),
            None => {}
        }
    }

    fn handle_start_round(&mut self) -> Result<(), RoomError> {
        let category = self.room.start_round()?;
        self.broadcast(ServerEvent::RoomLocked);
        self.broadcast(ServerEvent::RoundStarted {
            category: category.name.to_string(),
            difficulty: category.difficulty.to_string(),
            used_letters: self.room.used_letters().clone(),
            current_player: self.current_player(),
        });
        self.start_countdown()?;
        Ok(())
    }

    fn start_countdown(&mut self) -> Result<TurnSlot, RoomError> {
        let countdown = self.countdowns_started + 1;
        let tick_tx = self.signal_tx.clone();
        let expiry_tx = self.signal_tx.clone();
        let slot = self.room.start_timer(
            move |remaining: u32| {
                let _ = tick_tx.send(TimerSignal::Tick {
                    countdown,
                    remaining,
                });
            },
            move |slot| {
                let _ = expiry_tx.send(TimerSignal::Expired { slot });
            },
        )?;
        self.countdowns_started = countdown;
        self.live_countdown = Some(countdown);
        tracing::debug!(room_id = %self.room.id(), ?slot, "countdown started");
        Ok(slot)
    }

    fn handle_signal(&mut self, signal: TimerSignal) {
        match signal {
            TimerSignal::Tick {
                countdown,
                remaining,
            } => {
                if self.live_countdown == Some(countdown) {
                    self.broadcast(ServerEvent::Tick {
                        countdown: remaining,
                    });
                }
            }
            TimerSignal::Expired { slot } => {
                let Some(elimination) = self.room.on_timer_expiry(slot) else {
                    return;
                };
                self.broadcast(ServerEvent::PlayerEliminated {
                    eliminated_player: elimination.eliminated,
                });
                match elimination.resolution {
                    Some(resolution) => self.broadcast_resolution(resolution),
                    None => self.broadcast_start_turn(),
                }
            }
        }
    }

    fn broadcast_resolution(&self, resolution: Resolution) {
        let event = match resolution {
            Resolution::RoundEnded { winner } => ServerEvent::RoundEnded {
                winning_player: winner,
            },
            Resolution::GameEnded { winner } => ServerEvent::GameEnded {
                game_winner: winner,
                used_letters: self.room.used_letters().clone(),
                current_player: self.current_player(),
                player_count: self.room.player_count(),
            },
        };
        self.broadcast(event);
    }

    fn broadcast_start_turn(&self) {
        self.broadcast(ServerEvent::StartTurn {
            current_player: self.current_player(),
            used_letters: self.room.used_letters().clone(),
        });
    }

    /// Sends an event to every player with a live connection. Closed
    /// receivers are skipped.
    fn broadcast(&self, event: ServerEvent) {
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn is_holder(&self, player_id: &PlayerId) -> bool {
        self.room
            .current_player()
            .is_some_and(|p| p.id() == player_id)
    }

    fn current_player(&self) -> Option<PlayerView> {
        self.room.current_player().map(|p| p.view())
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room.id().clone(),
            locked: self.room.is_locked(),
            round_active: self.room.round_active(),
            timer: self.room.timer_state(),
            players: self.room.player_views(),
            used_letters: self.room.used_letters().clone(),
            current_player: self.current_player(),
        }
    }
}

/// Spawns a room actor and returns a handle to it.
pub(crate) fn spawn_room(room_id: RoomId, config: RoomConfig, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    let actor = RoomActor {
        room: Room::new(room_id.clone(), config),
        senders: HashMap::new(),
        receiver: rx,
        signal_tx,
        signal_rx,
        countdowns_started: 0,
        live_countdown: None,
        idle_since: Some(Instant::now()),
        closing: false,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
