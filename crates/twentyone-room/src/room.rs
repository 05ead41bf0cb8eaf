//! A room: roster, status, and deck behind one reader/writer lock.
//!
//! ```text
//! Waiting ──start──▶ Playing ──everyone stood or bust──▶ Ended
//!    ▲                                                    │
//!    └──────────────── start (next hand) ─────────────────┘
//! ```
//!
//! Every operation takes the lock once, runs to completion, and releases
//! it. Nothing that borrows the table escapes; callers get owned views.
//! Frames queued for players go through non-blocking outboxes, so fanning
//! out under the lock never waits on the network.

use std::time::SystemTime;

use parking_lot::RwLock;
use twentyone_protocol::{
    Codec, Envelope, GameEndView, JsonCodec, MessageKind, PlayerId,
    PlayerResult, PlayerStatus, PlayerView, PlayersView, RoomId, RoomStatus,
    RoomSummary,
};
use twentyone_transport::{ConnectionId, Outbox};

use crate::{Card, Deck, Player, RoomError, TableConfig};

/// Whether a join took a new seat or rebound an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Seated,
    Rejoined,
}

/// Everything the room lock guards.
#[derive(Debug)]
struct Table {
    /// Seating order is join order.
    seats: Vec<Player>,
    status: RoomStatus,
    /// Present iff `status` is Playing.
    deck: Option<Deck>,
}

impl Table {
    fn seat(&self, player_id: &PlayerId) -> Option<&Player> {
        self.seats.iter().find(|p| p.id() == player_id)
    }

    fn seat_mut(&mut self, player_id: &PlayerId) -> Option<&mut Player> {
        self.seats.iter_mut().find(|p| p.id() == player_id)
    }

    fn anyone_acting(&self) -> bool {
        self.seats.iter().any(|p| p.status() == PlayerStatus::Acting)
    }

    /// Roster for one viewer: their own hand face up, everyone else hidden.
    fn roster_for(&self, viewer: &PlayerId) -> PlayersView {
        PlayersView {
            players: self
                .seats
                .iter()
                .map(|p| p.view(p.id() != viewer))
                .collect(),
        }
    }

    fn results(&self, room_id: &RoomId) -> GameEndView {
        // Strictly highest non-bust total; the earlier seat keeps a tie.
        let mut winner: Option<(usize, u32)> = None;
        for (slot, p) in self.seats.iter().enumerate() {
            if p.status() == PlayerStatus::Bust || p.hand().is_empty() {
                continue;
            }
            if winner.is_none_or(|(_, best)| p.hand_value() > best) {
                winner = Some((slot, p.hand_value()));
            }
        }

        GameEndView {
            room_id: room_id.clone(),
            results: self
                .seats
                .iter()
                .enumerate()
                .map(|(slot, p)| PlayerResult {
                    player_id: p.id().clone(),
                    nickname: p.nickname().to_owned(),
                    score: p.hand_value(),
                    status: p.status(),
                    cards: p.card_tokens(),
                    is_winner: winner.is_some_and(|(w, _)| w == slot),
                })
                .collect(),
        }
    }
}

/// An isolated game session.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    created_at: SystemTime,
    config: TableConfig,
    table: RwLock<Table>,
}

impl Room {
    pub fn new(id: RoomId, config: TableConfig) -> Self {
        Self {
            id,
            created_at: SystemTime::now(),
            config,
            table: RwLock::new(Table {
                seats: Vec::new(),
                status: RoomStatus::Waiting,
                deck: None,
            }),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn status(&self) -> RoomStatus {
        self.table.read().status
    }

    pub fn player_count(&self) -> usize {
        self.table.read().seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().seats.is_empty()
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.table.read().seat(player_id).is_some()
    }

    /// Body of the HTTP room query.
    pub fn info(&self) -> RoomSummary {
        let table = self.table.read();
        RoomSummary {
            room_id: self.id.clone(),
            player_count: table.seats.len(),
            status: table.status,
        }
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    /// Seats a new player.
    ///
    /// # Errors
    /// `AlreadySeated` if the id holds a seat, `RoomFull` if every seat is
    /// taken. Occupancy is unchanged on error.
    pub fn add_player(&self, player: Player) -> Result<(), RoomError> {
        self.admit(&mut self.table.write(), player)
    }

    /// Seat admission shared by [`add_player`](Self::add_player) and
    /// [`join`](Self::join), run under the caller's write guard.
    fn admit(&self, table: &mut Table, mut player: Player) -> Result<(), RoomError> {
        if table.seat(player.id()).is_some() {
            return Err(RoomError::AlreadySeated(
                player.id().clone(),
                self.id.clone(),
            ));
        }
        if table.seats.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.id.clone()));
        }

        player.set_room(Some(self.id.clone()));
        tracing::info!(
            room_id = %self.id,
            player_id = %player.id(),
            players = table.seats.len() + 1,
            "player seated"
        );
        table.seats.push(player);
        Ok(())
    }

    /// Seats the player, or rebinds connection and nickname in place when
    /// they already hold a seat. The hand in progress is untouched.
    ///
    /// # Errors
    /// `RoomFull` when a new seat is needed and none is free.
    pub fn join(
        &self,
        player_id: &PlayerId,
        nickname: &str,
        outbox: Option<Outbox>,
    ) -> Result<JoinOutcome, RoomError> {
        let mut table = self.table.write();
        if let Some(seat) = table.seat_mut(player_id) {
            if !nickname.is_empty() {
                seat.set_nickname(nickname);
            }
            if let Some(outbox) = outbox {
                seat.attach(outbox);
            }
            let idle_ms =
                u64::try_from(seat.last_active().elapsed().as_millis())
                    .unwrap_or(u64::MAX);
            seat.touch();
            tracing::info!(room_id = %self.id, %player_id, idle_ms, "player rejoined");
            return Ok(JoinOutcome::Rejoined);
        }

        let mut player = Player::new(player_id.clone(), nickname);
        if let Some(outbox) = outbox {
            player.attach(outbox);
        }
        self.admit(&mut table, player)?;
        Ok(JoinOutcome::Seated)
    }

    /// Removes a player unconditionally. Emptying the room ends it.
    pub fn remove_player(&self, player_id: &PlayerId) -> Option<Player> {
        let mut table = self.table.write();
        let slot = table.seats.iter().position(|p| p.id() == player_id)?;
        let mut player = table.seats.remove(slot);
        player.set_room(None);

        if table.seats.is_empty() {
            table.status = RoomStatus::Ended;
            table.deck = None;
        }
        tracing::info!(
            room_id = %self.id,
            %player_id,
            players = table.seats.len(),
            "player left"
        );
        Some(player)
    }

    /// Binds a new connection to a seated player.
    pub fn attach(
        &self,
        player_id: &PlayerId,
        outbox: Outbox,
    ) -> Result<(), RoomError> {
        let mut table = self.table.write();
        let seat = table
            .seat_mut(player_id)
            .ok_or_else(|| self.not_seated(player_id))?;
        seat.attach(outbox);
        seat.touch();
        Ok(())
    }

    /// Unbinds every seat still holding connection `conn_id`. Seats that
    /// have since been rebound to a newer connection are left alone.
    /// Returns how many seats were detached.
    pub fn detach_connection(&self, conn_id: ConnectionId) -> usize {
        let mut table = self.table.write();
        let mut detached = 0;
        for seat in &mut table.seats {
            if seat.connection_id() == Some(conn_id) {
                seat.detach();
                detached += 1;
                tracing::debug!(
                    room_id = %self.id,
                    player_id = %seat.id(),
                    %conn_id,
                    "connection detached"
                );
            }
        }
        detached
    }

    pub fn rename(
        &self,
        player_id: &PlayerId,
        nickname: &str,
    ) -> Result<(), RoomError> {
        let mut table = self.table.write();
        let seat = table
            .seat_mut(player_id)
            .ok_or_else(|| self.not_seated(player_id))?;
        seat.set_nickname(nickname);
        Ok(())
    }

    /// Nickname of a seated player.
    pub fn nickname(&self, player_id: &PlayerId) -> Option<String> {
        self.table
            .read()
            .seat(player_id)
            .map(|p| p.nickname().to_owned())
    }

    pub fn player_view(
        &self,
        player_id: &PlayerId,
        hide: bool,
    ) -> Option<PlayerView> {
        self.table.read().seat(player_id).map(|p| p.view(hide))
    }

    /// The roster as `viewer` may see it.
    pub fn roster_for(&self, viewer: &PlayerId) -> PlayersView {
        self.table.read().roster_for(viewer)
    }

    // -----------------------------------------------------------------------
    // Game actions
    // -----------------------------------------------------------------------

    /// Deals a new hand from a freshly shuffled deck.
    pub fn start_game(&self) -> Result<(), RoomError> {
        self.start_game_with(Deck::new())
    }

    /// Deals a new hand from `deck`: two cards each, round by slot in
    /// seating order. Opening blackjacks stand automatically.
    ///
    /// # Errors
    /// `AlreadyPlaying`, `NoPlayers`, or `DeckExhausted` if `deck` cannot
    /// cover the opening deal. Nothing changes on error.
    pub fn start_game_with(&self, mut deck: Deck) -> Result<(), RoomError> {
        let mut table = self.table.write();
        if table.status == RoomStatus::Playing {
            return Err(RoomError::AlreadyPlaying(self.id.clone()));
        }
        if table.seats.is_empty() {
            return Err(RoomError::NoPlayers(self.id.clone()));
        }
        if deck.remaining() < table.seats.len() * 2 {
            return Err(RoomError::DeckExhausted(self.id.clone()));
        }

        for p in &mut table.seats {
            p.reset();
            p.begin_turn();
        }
        for _round in 0..2 {
            for p in &mut table.seats {
                let card = deck
                    .deal()
                    .ok_or_else(|| RoomError::DeckExhausted(self.id.clone()))?;
                p.add_card(card);
            }
        }
        for p in &mut table.seats {
            if p.is_blackjack() {
                p.stand();
            }
        }

        table.deck = Some(deck);
        table.status = RoomStatus::Playing;
        tracing::info!(
            room_id = %self.id,
            players = table.seats.len(),
            "hand started"
        );
        Ok(())
    }

    /// Deals one card to a player who can act.
    ///
    /// # Errors
    /// `NotPlaying`, `NotSeated`, `CannotAct`, `HandFull`, or
    /// `DeckExhausted`. The hand is untouched on error.
    pub fn player_hit(&self, player_id: &PlayerId) -> Result<Card, RoomError> {
        let mut guard = self.table.write();
        let table = &mut *guard;
        if table.status != RoomStatus::Playing {
            return Err(RoomError::NotPlaying(self.id.clone()));
        }
        let seat = table
            .seats
            .iter_mut()
            .find(|p| p.id() == player_id)
            .ok_or_else(|| self.not_seated(player_id))?;
        if !seat.can_act() {
            return Err(RoomError::CannotAct(player_id.clone()));
        }
        if seat.hand().len() >= self.config.max_hand_cards {
            return Err(RoomError::HandFull(player_id.clone()));
        }
        let card = table
            .deck
            .as_mut()
            .and_then(Deck::deal)
            .ok_or_else(|| RoomError::DeckExhausted(self.id.clone()))?;

        seat.add_card(card);
        seat.touch();
        tracing::debug!(
            room_id = %self.id,
            %player_id,
            %card,
            value = seat.hand_value(),
            "hit"
        );
        Ok(card)
    }

    /// Ends an acting player's turn.
    ///
    /// # Errors
    /// `NotPlaying`, `NotSeated`, or `CannotStand` unless Acting.
    pub fn player_stand(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        let mut table = self.table.write();
        if table.status != RoomStatus::Playing {
            return Err(RoomError::NotPlaying(self.id.clone()));
        }
        let seat = table
            .seat_mut(player_id)
            .ok_or_else(|| self.not_seated(player_id))?;
        if seat.status() != PlayerStatus::Acting {
            return Err(RoomError::CannotStand(player_id.clone()));
        }
        seat.stand();
        seat.touch();
        tracing::debug!(room_id = %self.id, %player_id, "stand");
        Ok(())
    }

    /// Reports whether the hand is over, flipping Playing to Ended once no
    /// one is Acting. A room that is not Playing reports `true`.
    pub fn check_game_end(&self) -> bool {
        let mut table = self.table.write();
        if table.status != RoomStatus::Playing {
            return true;
        }
        if table.anyone_acting() {
            return false;
        }
        table.status = RoomStatus::Ended;
        table.deck = None;
        tracing::info!(room_id = %self.id, "hand ended");
        true
    }

    /// Ends the hand if no one is Acting and returns the settlement.
    ///
    /// Returns `Some` exactly once per hand: only the call that performs
    /// the Playing → Ended transition gets the results.
    pub fn end_hand_if_done(&self) -> Option<GameEndView> {
        let mut table = self.table.write();
        if table.status != RoomStatus::Playing || table.anyone_acting() {
            return None;
        }
        table.status = RoomStatus::Ended;
        table.deck = None;

        let results = table.results(&self.id);
        let winner = results
            .winner()
            .map(|w| w.player_id.to_string())
            .unwrap_or_default();
        tracing::info!(room_id = %self.id, %winner, "hand ended");
        Some(results)
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Sends one envelope to every connected player.
    pub fn broadcast(&self, envelope: &Envelope) {
        let Some(frame) = encode(envelope) else { return };
        let table = self.table.read();
        for p in &table.seats {
            p.send(frame.clone());
        }
    }

    /// Sends an envelope to one seated player, if connected.
    pub fn send_to(&self, player_id: &PlayerId, envelope: &Envelope) {
        let Some(frame) = encode(envelope) else { return };
        if let Some(p) = self.table.read().seat(player_id) {
            p.send(frame);
        }
    }

    /// Sends every player the roster with only their own hand face up.
    pub fn publish_roster(&self) {
        let table = self.table.read();
        for p in &table.seats {
            let roster = table.roster_for(p.id());
            if let Some(frame) = Envelope::new(MessageKind::Players, &roster)
                .ok()
                .as_ref()
                .and_then(encode)
            {
                p.send(frame);
            }
        }
    }

    /// Sends one player's view to the room: face up to that player, hidden
    /// to everyone else.
    pub fn publish_update(&self, player_id: &PlayerId) {
        let table = self.table.read();
        let Some(subject) = table.seat(player_id) else {
            return;
        };
        let full = Envelope::new(MessageKind::Update, &subject.view(false));
        let hidden = Envelope::new(MessageKind::Update, &subject.view(true));
        let (Ok(full), Ok(hidden)) = (full, hidden) else {
            return;
        };
        let (Some(full), Some(hidden)) = (encode(&full), encode(&hidden)) else {
            return;
        };

        for p in &table.seats {
            if p.id() == player_id {
                p.send(full.clone());
            } else {
                p.send(hidden.clone());
            }
        }
    }

    fn not_seated(&self, player_id: &PlayerId) -> RoomError {
        RoomError::NotSeated(player_id.clone(), self.id.clone())
    }
}

fn encode(envelope: &Envelope) -> Option<String> {
    match JsonCodec.encode(envelope) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(kind = %envelope.kind, error = %e, "encode failed");
            None
        }
    }
}
