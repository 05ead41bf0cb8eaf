//! Unified error type for the twentyone server.

use twentyone_protocol::ProtocolError;
use twentyone_room::RoomError;
use twentyone_transport::TransportError;

/// Top-level error wrapping every crate-specific error.
///
/// `#[from]` lets `?` lift sub-crate errors into this type.
#[derive(Debug, thiserror::Error)]
pub enum TwentyOneError {
    /// Binding, accepting, or talking to a connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame or payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room or registry operation was refused.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The HTTP listener failed.
    #[error("http server: {0}")]
    Http(#[source] std::io::Error),
}
