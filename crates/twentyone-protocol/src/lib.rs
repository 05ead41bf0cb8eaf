//! Wire protocol for twentyone.
//!
//! - **Types** ([`Envelope`], [`MessageKind`], request payloads and views):
//!   the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become text
//!   frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms. It sits
//! between the transport (text frames) and the game engine (typed state):
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Room (game state)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ChatRequest, ChatView, ConnectRequest, CreatedRoom, Envelope,
    GameEndView, HIDDEN_CARD, JoinRequest, MessageKind, PlayerId,
    PlayerResult, PlayerStatus, PlayerView, PlayersView, RoomId, RoomInfoView,
    RoomStatus, RoomSummary, SeatRequest, StartNotice,
};
