//! One participant's seat: identity, hand, status, and live connection.

use std::time::Instant;

use twentyone_protocol::{HIDDEN_CARD, PlayerId, PlayerStatus, PlayerView, RoomId};
use twentyone_transport::{ConnectionId, Outbox};

use crate::{Card, hand_value, is_blackjack};

/// A seated player.
///
/// The outbox is optional and swappable: a reconnecting client gets its new
/// connection bound here without touching the hand in progress.
#[derive(Debug)]
pub struct Player {
    id: PlayerId,
    nickname: String,
    hand: Vec<Card>,
    status: PlayerStatus,
    hand_value: u32,
    room_id: Option<RoomId>,
    outbox: Option<Outbox>,
    last_active: Instant,
}

impl Player {
    pub fn new(id: PlayerId, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            hand: Vec::new(),
            status: PlayerStatus::Waiting,
            hand_value: 0,
            room_id: None,
            outbox: None,
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn hand_value(&self) -> u32 {
        self.hand_value
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub(crate) fn set_room(&mut self, room_id: Option<RoomId>) {
        self.room_id = room_id;
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    // -----------------------------------------------------------------------
    // Hand
    // -----------------------------------------------------------------------

    /// Clears the hand for a new round.
    pub fn reset(&mut self) {
        self.hand.clear();
        self.hand_value = 0;
        self.status = PlayerStatus::Waiting;
    }

    pub(crate) fn begin_turn(&mut self) {
        self.status = PlayerStatus::Acting;
    }

    /// Appends a card and rescores. Going over 21 flips the status to Bust.
    pub fn add_card(&mut self, card: Card) {
        self.hand.push(card);
        self.hand_value = hand_value(&self.hand);
        if self.hand_value > 21 {
            self.status = PlayerStatus::Bust;
        }
    }

    pub fn stand(&mut self) {
        self.status = PlayerStatus::Stood;
    }

    /// Acting and still under 21. A player sitting on exactly 21 stays
    /// Acting but cannot draw.
    pub fn can_act(&self) -> bool {
        self.status == PlayerStatus::Acting && self.hand_value < 21
    }

    pub fn is_blackjack(&self) -> bool {
        is_blackjack(&self.hand)
    }

    /// Card tokens in deal order, all face up.
    pub fn card_tokens(&self) -> Vec<String> {
        self.hand.iter().map(Card::token).collect()
    }

    /// The player as a recipient may see it.
    ///
    /// With `hide` set and more than one card in hand, every card after the
    /// first becomes [`HIDDEN_CARD`] and the total is withheld.
    pub fn view(&self, hide: bool) -> PlayerView {
        let hidden = hide && self.hand.len() > 1;
        let cards = if hidden {
            std::iter::once(self.hand[0].token())
                .chain(std::iter::repeat_n(
                    HIDDEN_CARD.to_owned(),
                    self.hand.len() - 1,
                ))
                .collect()
        } else {
            self.card_tokens()
        };

        PlayerView {
            id: self.id.clone(),
            nickname: self.nickname.clone(),
            cards,
            card_count: self.hand.len(),
            hand_value: (!hidden).then_some(self.hand_value),
            status: self.status,
            status_color: self.status.color().to_owned(),
        }
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Binds a live connection, returning the one it replaces.
    pub fn attach(&mut self, outbox: Outbox) -> Option<Outbox> {
        self.outbox.replace(outbox)
    }

    /// Unbinds the connection, returning it.
    pub fn detach(&mut self) -> Option<Outbox> {
        self.outbox.take()
    }

    /// Id of the bound connection, open or not.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.outbox.as_ref().map(Outbox::id)
    }

    /// Whether a live, open connection is bound.
    pub fn is_connected(&self) -> bool {
        self.outbox.as_ref().is_some_and(|o| !o.is_closed())
    }

    /// Queues a frame on the bound connection. Players without an open
    /// connection are skipped.
    pub fn send(&self, frame: String) {
        let Some(outbox) = self.outbox.as_ref().filter(|o| !o.is_closed()) else {
            return;
        };
        if let Err(e) = outbox.send(frame) {
            tracing::debug!(player_id = %self.id, error = %e, "dropped frame");
        }
    }
}
