//! # Quik
//!
//! Server for a multiplayer elimination word game.
//!
//! Players gather in a room and take turns naming a word in the round's
//! category that starts with a letter nobody has used yet. Each turn runs
//! under a countdown; whoever is holding the turn when it reaches zero is
//! out. The last player standing wins the round, and the first to win
//! three rounds wins the game.
//!
//! The crate ties the layers together: WebSocket transport → JSON events →
//! room registry → one actor task per room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quik::prelude::*;
//!
//! # async fn start() -> Result<(), QuikError> {
//! let server = QuikServer::builder()
//!     .config(ServerConfig::from_env())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_HOST, DEFAULT_PORT, ServerConfig};
pub use error::QuikError;
pub use server::{QuikServer, QuikServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{QuikError, QuikServer, QuikServerBuilder, ServerConfig};
    pub use quik_protocol::{
        ClientEvent, Codec, JsonCodec, PlayerId, PlayerView, RoomId, ServerEvent, UsedLetters,
    };
    pub use quik_room::{RoomConfig, RoomError, RoomRegistry};
    pub use quik_timer::TimerConfig;
}
