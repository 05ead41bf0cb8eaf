//! Error types for the room layer.

use twentyone_protocol::{PlayerId, RoomId};

/// Errors that can occur during room and registry operations.
///
/// Every variant leaves room state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player already holds a seat in this room.
    #[error("player {0} already seated in room {1}")]
    AlreadySeated(PlayerId, RoomId),

    /// The player holds no seat in this room.
    #[error("player {0} not seated in room {1}")]
    NotSeated(PlayerId, RoomId),

    /// A hand is already in progress.
    #[error("room {0} is already playing")]
    AlreadyPlaying(RoomId),

    /// A hand cannot start in an empty room.
    #[error("room {0} has no players")]
    NoPlayers(RoomId),

    /// No hand is in progress.
    #[error("room {0} is not playing")]
    NotPlaying(RoomId),

    /// The player's turn is over or their hand already totals 21.
    #[error("player {0} cannot act")]
    CannotAct(PlayerId),

    /// The player is not acting, so there is nothing to stand on.
    #[error("player {0} cannot stand")]
    CannotStand(PlayerId),

    /// The hand reached the card limit.
    #[error("player {0} holds the maximum number of cards")]
    HandFull(PlayerId),

    /// The deck ran out. Unreachable with a validated table config.
    #[error("deck exhausted in room {0}")]
    DeckExhausted(RoomId),

    /// Every room code is in use.
    #[error("no free room id")]
    IdSpaceExhausted,

    /// The table configuration is unusable.
    #[error("invalid table config: {0}")]
    InvalidConfig(String),
}
