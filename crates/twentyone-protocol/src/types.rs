//! Core protocol types for twentyone's wire format.
//!
//! Every frame is one JSON [`Envelope`]: `{"type": kind, "data": payload?,
//! "error": text?}`. Field names on the wire are camelCase.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Token sent in place of a hole card the recipient may not see.
pub const HIDDEN_CARD: &str = "pk-hide";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A client-chosen player identifier.
///
/// Clients generate their own id and reuse it across reconnects, so this is
/// an opaque string rather than a server-allocated number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short, human-typeable room code such as `"48213"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a raw room code.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw room code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The kind of a frame, carried in its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    // -- Client → Server (connect is echoed back as the ack) --
    Connect,
    Join,
    Leave,
    Start,
    Hit,
    Stand,
    Chat,

    // -- Server → Client --
    Update,
    Error,
    RoomInfo,
    Players,
    GameEnd,

    /// Any kind this server does not recognise.
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    /// Returns the wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Start => "start",
            Self::Hit => "hit",
            Self::Stand => "stand",
            Self::Chat => "chat",
            Self::Update => "update",
            Self::Error => "error",
            Self::RoomInfo => "roomInfo",
            Self::Players => "players",
            Self::GameEnd => "gameEnd",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outer frame: a kind plus an optional payload or error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Builds an envelope carrying `payload` as its data.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the payload cannot be serialized.
    pub fn new<T: Serialize>(
        kind: MessageKind,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let data = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            kind,
            data: Some(data),
            error: None,
        })
    }

    /// Builds an `error` envelope with the given text.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Decodes the data field into a typed payload.
    ///
    /// A missing data field decodes as JSON `null`, so payloads with
    /// required fields fail cleanly.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the data does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match &self.data {
            Some(data) => T::deserialize(data).map_err(ProtocolError::Decode),
            None => T::deserialize(&serde_json::Value::Null)
                .map_err(ProtocolError::Decode),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server payloads
// ---------------------------------------------------------------------------

/// `connect`: announce (or re-announce) an identity. Also the ack shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub player_id: PlayerId,
    #[serde(default)]
    pub nickname: String,
}

/// `join`: take a seat in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    #[serde(default)]
    pub nickname: String,
}

/// `leave`, `start`, `hit`, `stand`: a player acting in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// `chat`: a line of table talk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Ended,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Ended => "ended",
        })
    }
}

/// Where a player is within the current hand.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    #[default]
    Waiting,
    Acting,
    Stood,
    Bust,
}

impl PlayerStatus {
    /// Display colour the client paints the status badge with.
    pub fn color(self) -> &'static str {
        match self {
            Self::Waiting => "gray",
            Self::Acting => "yellow",
            Self::Stood => "green",
            Self::Bust => "red",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client views
// ---------------------------------------------------------------------------

/// `start`: a new hand has been dealt in this room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartNotice {
    pub room_id: RoomId,
}

/// One player as seen by one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    /// Card tokens in deal order; hole cards may be [`HIDDEN_CARD`].
    pub cards: Vec<String>,
    pub card_count: usize,
    /// `None` when hole cards are hidden, so the total cannot leak them.
    pub hand_value: Option<u32>,
    pub status: PlayerStatus,
    pub status_color: String,
}

/// `players`: the roster in seating order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersView {
    pub players: Vec<PlayerView>,
}

/// `roomInfo`: sent to a connection that just joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoView {
    pub room_id: RoomId,
    pub status: RoomStatus,
}

/// One line of the settlement table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u32,
    pub status: PlayerStatus,
    pub cards: Vec<String>,
    pub is_winner: bool,
}

/// `gameEnd`: the hand is over and every card is revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndView {
    pub room_id: RoomId,
    pub results: Vec<PlayerResult>,
}

impl GameEndView {
    /// The winning line, if any player finished without busting.
    pub fn winner(&self) -> Option<&PlayerResult> {
        self.results.iter().find(|r| r.is_winner)
    }
}

/// `chat`: fanned out to the whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub player_id: PlayerId,
    pub nickname: String,
    pub message: String,
    /// Server time in milliseconds since the Unix epoch.
    pub time: u64,
}

// ---------------------------------------------------------------------------
// HTTP bodies
// ---------------------------------------------------------------------------

/// Response body of `POST /api/room/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_id: RoomId,
}

/// Response body of `GET /api/room/{roomId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub player_count: usize,
    pub status: RoomStatus,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_value(SeatRequest {
            room_id: RoomId::from("12345"),
            player_id: PlayerId::from("p-1"),
        })
        .unwrap();
        assert_eq!(json, json!({"roomId": "12345", "playerId": "p-1"}));
        assert_eq!(RoomId::from("12345").to_string(), "12345");
    }

    #[test]
    fn test_message_kind_wire_names() {
        for kind in [
            MessageKind::Connect,
            MessageKind::RoomInfo,
            MessageKind::GameEnd,
            MessageKind::Players,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_envelope_payload_decodes_join() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "join",
            "data": {"roomId": "55555", "playerId": "alice", "nickname": "Al"}
        }))
        .unwrap();
        assert_eq!(envelope.kind, MessageKind::Join);

        let join: JoinRequest = envelope.payload().unwrap();
        assert_eq!(join.room_id.as_str(), "55555");
        assert_eq!(join.player_id.as_str(), "alice");
        assert_eq!(join.nickname, "Al");
    }

    #[test]
    fn test_envelope_payload_missing_data_fails() {
        let envelope: Envelope =
            serde_json::from_value(json!({"type": "hit"})).unwrap();
        let err = envelope.payload::<SeatRequest>().unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_envelope_payload_wrong_shape_fails() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "chat",
            "data": {"roomId": 5}
        }))
        .unwrap();
        assert!(envelope.payload::<ChatRequest>().is_err());
    }

    #[test]
    fn test_player_view_wire_shape() {
        let view = PlayerView {
            id: PlayerId::from("bob"),
            nickname: "Bob".into(),
            cards: vec!["pk-spadeA".into(), HIDDEN_CARD.into()],
            card_count: 2,
            hand_value: None,
            status: PlayerStatus::Acting,
            status_color: PlayerStatus::Acting.color().into(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            json!({
                "id": "bob",
                "nickname": "Bob",
                "cards": ["pk-spadeA", "pk-hide"],
                "cardCount": 2,
                "handValue": null,
                "status": "acting",
                "statusColor": "yellow"
            })
        );
    }

    #[test]
    fn test_game_end_winner() {
        let line = |id: &str, winner| PlayerResult {
            player_id: PlayerId::from(id),
            nickname: id.into(),
            score: 20,
            status: PlayerStatus::Stood,
            cards: vec![],
            is_winner: winner,
        };
        let view = GameEndView {
            room_id: RoomId::from("10000"),
            results: vec![line("a", false), line("b", true)],
        };
        assert_eq!(view.winner().unwrap().player_id.as_str(), "b");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["results"][1]["isWinner"], json!(true));
        assert_eq!(json["results"][1]["playerId"], json!("b"));
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(PlayerStatus::Waiting.color(), "gray");
        assert_eq!(PlayerStatus::Acting.color(), "yellow");
        assert_eq!(PlayerStatus::Stood.color(), "green");
        assert_eq!(PlayerStatus::Bust.color(), "red");
    }
}
