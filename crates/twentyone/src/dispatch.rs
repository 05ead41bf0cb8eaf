//! Message dispatch: one handler per client message kind.
//!
//! Each inbound frame is decoded into an [`Envelope`], routed by kind to
//! exactly one handler, and the handler's outcome is fanned out through
//! the room. A failure produces a single `error` reply on the originating
//! connection. This is the only place user-facing error text is written.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use twentyone_protocol::{
    ChatRequest, ChatView, Codec, ConnectRequest, Envelope, JoinRequest,
    JsonCodec, MessageKind, ProtocolError, RoomInfoView, SeatRequest,
    StartNotice,
};
use twentyone_room::{Departure, Registry, Room, RoomError};
use twentyone_transport::Outbox;

use crate::TwentyOneError;

const UNKNOWN_KIND: &str = "unknown message type";
const INVALID_FORMAT: &str = "invalid message format";

/// Routes decoded client messages to registry and room operations.
pub struct Dispatcher<C: Codec = JsonCodec> {
    registry: Arc<Registry>,
    codec: C,
}

impl Dispatcher<JsonCodec> {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_codec(registry, JsonCodec)
    }
}

impl<C: Codec> Dispatcher<C> {
    pub fn with_codec(registry: Arc<Registry>, codec: C) -> Self {
        Self { registry, codec }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handles one inbound frame from the connection behind `outbox`.
    pub fn dispatch(&self, outbox: &Outbox, frame: &str) {
        let envelope: Envelope = match self.codec.decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(conn_id = %outbox.id(), error = %e, "undecodable frame");
                self.reply(outbox, &Envelope::error(INVALID_FORMAT));
                return;
            }
        };

        tracing::debug!(conn_id = %outbox.id(), kind = %envelope.kind, "dispatch");
        let result = match envelope.kind {
            MessageKind::Connect => self.on_connect(outbox, &envelope),
            MessageKind::Join => self.on_join(outbox, &envelope),
            MessageKind::Leave => self.on_leave(outbox, &envelope),
            MessageKind::Start => self.on_start(&envelope),
            MessageKind::Hit => self.on_hit(&envelope),
            MessageKind::Stand => self.on_stand(&envelope),
            MessageKind::Chat => self.on_chat(&envelope),
            MessageKind::Update
            | MessageKind::Error
            | MessageKind::RoomInfo
            | MessageKind::Players
            | MessageKind::GameEnd
            | MessageKind::Unknown => {
                self.reply(outbox, &Envelope::error(UNKNOWN_KIND));
                return;
            }
        };

        if let Err(e) = result {
            tracing::debug!(
                conn_id = %outbox.id(),
                kind = %envelope.kind,
                error = %e,
                "request refused"
            );
            self.reply(outbox, &Envelope::error(describe(&e)));
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn on_connect(
        &self,
        outbox: &Outbox,
        envelope: &Envelope,
    ) -> Result<(), TwentyOneError> {
        let req: ConnectRequest = envelope.payload()?;
        let rebound = self.registry.connect_player(
            &req.player_id,
            &req.nickname,
            Some(outbox.clone()),
        );
        let nickname = self
            .registry
            .player(&req.player_id)
            .map(|p| p.nickname)
            .unwrap_or(req.nickname);

        self.reply(
            outbox,
            &Envelope::new(
                MessageKind::Connect,
                &ConnectRequest {
                    player_id: req.player_id,
                    nickname,
                },
            )?,
        );
        if let Some(room) = rebound {
            room.publish_roster();
        }
        Ok(())
    }

    fn on_join(
        &self,
        outbox: &Outbox,
        envelope: &Envelope,
    ) -> Result<(), TwentyOneError> {
        let req: JoinRequest = envelope.payload()?;
        let (room, _) = self.registry.join_room(
            &req.room_id,
            &req.player_id,
            &req.nickname,
            Some(outbox.clone()),
        )?;

        self.reply(
            outbox,
            &Envelope::new(
                MessageKind::RoomInfo,
                &RoomInfoView {
                    room_id: room.id().clone(),
                    status: room.status(),
                },
            )?,
        );
        room.publish_roster();
        Ok(())
    }

    fn on_leave(
        &self,
        outbox: &Outbox,
        envelope: &Envelope,
    ) -> Result<(), TwentyOneError> {
        let req: SeatRequest = envelope.payload()?;
        let departure = self.registry.leave_room(&req.room_id, &req.player_id);
        self.reply(outbox, &Envelope::new(MessageKind::Leave, &req)?);
        if let Departure::Left(room) = departure {
            announce_departure(&room);
        }
        Ok(())
    }

    fn on_start(&self, envelope: &Envelope) -> Result<(), TwentyOneError> {
        let req: SeatRequest = envelope.payload()?;
        let room = self.seated_room(&req)?;
        room.start_game()?;

        room.broadcast(&Envelope::new(
            MessageKind::Start,
            &StartNotice {
                room_id: room.id().clone(),
            },
        )?);
        room.publish_roster();
        // Every seat may have opened with a blackjack.
        if let Some(end) = room.end_hand_if_done() {
            room.broadcast(&Envelope::new(MessageKind::GameEnd, &end)?);
        }
        Ok(())
    }

    fn on_hit(&self, envelope: &Envelope) -> Result<(), TwentyOneError> {
        let req: SeatRequest = envelope.payload()?;
        let room = self.room(&req)?;
        room.player_hit(&req.player_id)?;
        room.publish_update(&req.player_id);
        finish_action(&room)
    }

    fn on_stand(&self, envelope: &Envelope) -> Result<(), TwentyOneError> {
        let req: SeatRequest = envelope.payload()?;
        let room = self.room(&req)?;
        room.player_stand(&req.player_id)?;
        room.publish_update(&req.player_id);
        finish_action(&room)
    }

    fn on_chat(&self, envelope: &Envelope) -> Result<(), TwentyOneError> {
        let req: ChatRequest = envelope.payload()?;
        if req.message.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage("empty chat".into()).into());
        }
        let room = self
            .registry
            .room(&req.room_id)
            .ok_or_else(|| RoomError::NotFound(req.room_id.clone()))?;
        let nickname = room.nickname(&req.player_id).ok_or_else(|| {
            RoomError::NotSeated(req.player_id.clone(), req.room_id.clone())
        })?;

        room.broadcast(&Envelope::new(
            MessageKind::Chat,
            &ChatView {
                player_id: req.player_id,
                nickname,
                message: req.message,
                time: now_millis(),
            },
        )?);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn room(&self, req: &SeatRequest) -> Result<Arc<Room>, RoomError> {
        self.registry
            .room(&req.room_id)
            .ok_or_else(|| RoomError::NotFound(req.room_id.clone()))
    }

    fn seated_room(&self, req: &SeatRequest) -> Result<Arc<Room>, RoomError> {
        let room = self.room(req)?;
        if !room.contains(&req.player_id) {
            return Err(RoomError::NotSeated(
                req.player_id.clone(),
                req.room_id.clone(),
            ));
        }
        Ok(room)
    }

    fn reply(&self, outbox: &Outbox, envelope: &Envelope) {
        match self.codec.encode(envelope) {
            Ok(frame) => {
                if let Err(e) = outbox.send(frame) {
                    tracing::debug!(conn_id = %outbox.id(), error = %e, "reply dropped");
                }
            }
            Err(e) => {
                tracing::warn!(kind = %envelope.kind, error = %e, "encode failed");
            }
        }
    }
}

/// After a hit or stand: settle if that was the last action, otherwise
/// refresh the roster.
fn finish_action(room: &Room) -> Result<(), TwentyOneError> {
    match room.end_hand_if_done() {
        Some(end) => room.broadcast(&Envelope::new(MessageKind::GameEnd, &end)?),
        None => room.publish_roster(),
    }
    Ok(())
}

/// Tells the players left behind: the hand may now be over, and the roster
/// has changed either way.
pub(crate) fn announce_departure(room: &Room) {
    if let Some(end) = room.end_hand_if_done() {
        match Envelope::new(MessageKind::GameEnd, &end) {
            Ok(envelope) => room.broadcast(&envelope),
            Err(e) => tracing::warn!(error = %e, "encode failed"),
        }
    }
    room.publish_roster();
}

/// The text a client sees for a refused request.
fn describe(err: &TwentyOneError) -> &'static str {
    match err {
        TwentyOneError::Room(e) => match e {
            RoomError::NotFound(_) => "room not found",
            RoomError::RoomFull(_) => "room is full",
            RoomError::AlreadySeated(..) => "already seated in this room",
            RoomError::NotSeated(..) => "not seated in this room",
            RoomError::AlreadyPlaying(_) => "game already in progress",
            RoomError::NoPlayers(_) => "no players in room",
            RoomError::NotPlaying(_) => "game is not in progress",
            RoomError::CannotAct(_) => "cannot act right now",
            RoomError::CannotStand(_) => "cannot stand right now",
            RoomError::HandFull(_) => "hand is full",
            RoomError::DeckExhausted(_) => "deck exhausted",
            RoomError::IdSpaceExhausted => "no room available",
            RoomError::InvalidConfig(_) => "server misconfigured",
        },
        TwentyOneError::Protocol(_) => INVALID_FORMAT,
        TwentyOneError::Transport(_) | TwentyOneError::Http(_) => {
            "connection error"
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
