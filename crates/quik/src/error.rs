//! Unified error type for the Quik server.

use quik_protocol::ProtocolError;
use quik_room::RoomError;
use quik_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum QuikError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room rejected an operation or is gone.
    #[error(transparent)]
    Room(#[from] RoomError),
}
