//! Room lifecycle and turn logic for Quik.
//!
//! A room holds a handful of players taking turns under a countdown. When
//! the countdown runs out the player holding the turn is eliminated; the
//! last player standing wins the round, and the first player to win three
//! rounds wins the game.
//!
//! # Key types
//!
//! - [`TurnCycle`]: players, the rotation for the active round, elimination
//! - [`Room`]: the orchestrator: lock state, used letters, category, timer
//! - [`Resolution`]: how a round ended (round win or game win)
//! - [`RoomHandle`]: talk to a room running as its own Tokio task
//! - [`RoomRegistry`]: creates rooms and knows which player is where
//!
//! # Concurrency
//!
//! [`Room`] itself is plain synchronous state. Each live room is owned by a
//! single actor task; every mutation, including countdown expiry, arrives as
//! a message on that task's channel, so operations on one room never
//! interleave.

mod actor;
mod category;
mod config;
mod cycle;
mod error;
mod ledger;
mod player;
mod registry;
mod room;

pub use actor::{PlayerSender, RoomHandle, RoomInfo};
pub use category::{Category, Difficulty, select_category, select_category_with};
pub use config::RoomConfig;
pub use cycle::{ActiveMembers, Removed, TurnCycle};
pub use error::RoomError;
pub use ledger::{DEFAULT_WIN_THRESHOLD, Resolution};
pub use player::Player;
pub use registry::RoomRegistry;
pub use room::{Elimination, Room, TurnSlot};
