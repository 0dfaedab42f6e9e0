//! Room registry: creates rooms, tracks them, and routes players to them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use quik_protocol::{PlayerId, RoomId};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::actor::{DEFAULT_CHANNEL_SIZE, spawn_room};
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomInfo};

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "dusty", "eager", "fuzzy", "gentle", "hasty", "icy", "jolly",
    "keen", "lucky", "mellow", "nimble", "odd", "proud", "quick", "rusty", "sunny", "tidy",
    "vivid", "witty", "young", "zesty",
];

const ANIMALS: &[&str] = &[
    "badger", "crane", "dingo", "eagle", "falcon", "gecko", "heron", "ibis", "jackal", "koala",
    "lemur", "marmot", "newt", "otter", "panda", "quail", "raven", "stoat", "tapir", "urchin",
    "viper", "walrus", "yak", "zebra",
];

/// Collisions are retried this many times before a numeric suffix is added.
const SLUG_ATTEMPTS: usize = 8;

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomId, RoomHandle>,
    /// A player is indexed in at most one room.
    player_rooms: HashMap<PlayerId, RoomId>,
}

impl Inner {
    /// Forgets rooms whose actor has stopped on its own (emptied or idle)
    /// along with every index entry pointing at them.
    fn prune(&mut self) {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| handle.is_alive());
        if self.rooms.len() == before {
            return;
        }
        let Inner {
            rooms,
            player_rooms,
        } = self;
        player_rooms.retain(|_, room_id| rooms.contains_key(room_id));
        tracing::debug!(closed = before - rooms.len(), "pruned closed rooms");
    }

    fn forget(&mut self, room_id: &RoomId) -> Option<RoomHandle> {
        let handle = self.rooms.remove(room_id)?;
        self.player_rooms.retain(|_, rid| rid != room_id);
        Some(handle)
    }
}

/// All live rooms of a server.
///
/// Locking is internal, so a registry is shared as `Arc<RoomRegistry>`.
/// The lock is never held across an `.await`: async methods look up the
/// handle, release the lock, then talk to the room actor.
///
/// Rooms close themselves (see [`RoomConfig::idle_timeout`]); every lookup
/// skips rooms whose actor has stopped.
pub struct RoomRegistry {
    config: RoomConfig,
    inner: Mutex<Inner>,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Spawns a new room under a fresh `word-word` id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create_room(&self) -> RoomHandle {
        let mut inner = self.lock();
        let room_id = unique_slug(&inner.rooms, &mut rand::rng());
        let handle = spawn_room(room_id.clone(), self.config.clone(), DEFAULT_CHANNEL_SIZE);
        inner.rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = inner.rooms.len(), "room created");
        handle
    }

    pub fn get(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.lock()
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// The room a player is in.
    pub fn room_of(&self, player_id: &PlayerId) -> Result<RoomId, RoomError> {
        self.lock()
            .player_rooms
            .get(player_id)
            .cloned()
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))
    }

    /// Handle of the room a player is in.
    pub fn handle_of(&self, player_id: &PlayerId) -> Result<RoomHandle, RoomError> {
        let room_id = self.room_of(player_id)?;
        self.get(&room_id)
    }

    /// Joins (or reconnects) a player and records which room they're in.
    ///
    /// A player indexed in another room must leave it first. The index
    /// entry is claimed before the room is asked, so a concurrent join of
    /// the same id elsewhere is refused, and released if the room refuses.
    pub async fn join(
        &self,
        room_id: &RoomId,
        player_id: PlayerId,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<RoomInfo, RoomError> {
        let (handle, claimed) = {
            let mut inner = self.lock();
            let handle = inner
                .rooms
                .get(room_id)
                .cloned()
                .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
            let claimed = match inner.player_rooms.get(&player_id).cloned() {
                Some(current) if &current != room_id => {
                    return Err(RoomError::InvalidState(format!(
                        "player {player_id} is already in room {current}"
                    )));
                }
                Some(_) => false,
                None => {
                    inner.player_rooms.insert(player_id.clone(), room_id.clone());
                    true
                }
            };
            (handle, claimed)
        };

        let result = handle.join(player_id.clone(), name, sender).await;
        if result.is_err() && claimed {
            self.release(&player_id, room_id);
        }
        result
    }

    /// Removes a player from their room. Returns the number of players
    /// left; a room left empty closes itself and is forgotten here.
    pub async fn leave(&self, player_id: &PlayerId) -> Result<usize, RoomError> {
        let handle = self.handle_of(player_id)?;
        let remaining = handle.leave(player_id.clone()).await?;

        let mut inner = self.lock();
        if remaining == 0 {
            inner.forget(handle.room_id());
            tracing::info!(room_id = %handle.room_id(), "room removed");
        } else if inner.player_rooms.get(player_id) == Some(handle.room_id()) {
            inner.player_rooms.remove(player_id);
        }
        Ok(remaining)
    }

    /// Marks a player's connection lost. They stay indexed so they can
    /// rejoin under the same id until the room goes idle. Returns how many
    /// players in the room are still connected.
    pub async fn disconnect(&self, player_id: &PlayerId) -> Result<usize, RoomError> {
        let handle = self.handle_of(player_id)?;
        handle.disconnect(player_id.clone()).await
    }

    /// Shuts a room down and drops every index entry pointing at it.
    pub async fn remove_room(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self
            .lock()
            .forget(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        // An actor that already stopped is just as gone.
        let _ = handle.shutdown().await;
        tracing::info!(%room_id, "room removed");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.lock().rooms.keys().cloned().collect()
    }

    /// Drops `player_id`'s index entry if it still points at `room_id`.
    fn release(&self, player_id: &PlayerId, room_id: &RoomId) {
        let mut inner = self.lock();
        if inner.player_rooms.get(player_id) == Some(room_id) {
            inner.player_rooms.remove(player_id);
        }
    }

    /// Locks the index with closed rooms already pruned.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The index stays consistent between statements, so a panic in
        // another holder leaves nothing half-written.
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.prune();
        inner
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("config", &self.config)
            .field("rooms", &self.room_count())
            .finish()
    }
}

fn slug<R: Rng + ?Sized>(rng: &mut R) -> RoomId {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("quiet");
    let animal = ANIMALS.choose(rng).copied().unwrap_or("mouse");
    RoomId::new(format!("{adjective}-{animal}"))
}

fn unique_slug<R: Rng + ?Sized>(taken: &HashMap<RoomId, RoomHandle>, rng: &mut R) -> RoomId {
    for _ in 0..SLUG_ATTEMPTS {
        let id = slug(rng);
        if !taken.contains_key(&id) {
            return id;
        }
    }
    let base = slug(rng);
    let mut n = 2usize;
    loop {
        let id = RoomId::new(format!("{base}-{n}"));
        if !taken.contains_key(&id) {
            return id;
        }
        n += 1;
    }
}
