//! Wire protocol for Quik.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`]): opaque ids shared by every
//!   layer.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): tagged messages in the
//!   `{ "type": ..., "payload": ... }` shape the web client expects.
//! - **Snapshots** ([`PlayerView`], [`UsedLetters`]): plain data the room
//!   hands out for broadcast.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, events out.
//!
//! The protocol knows nothing about rooms, timers or sockets.

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{PlayerId, PlayerView, RoomId, UsedLetters};
