//! Registry: the process-wide directory of rooms and known players.
//!
//! Lock order: the rooms map before the players map, and either map before
//! a room's own lock. A room lock is released before the players map is
//! taken and is never held while acquiring a map lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use twentyone_protocol::{PlayerId, RoomId};
use twentyone_transport::{ConnectionId, Outbox};

use crate::{JoinOutcome, Room, RoomError, TableConfig};

/// Random draws before falling back to a scan for a free room code.
const MAX_ID_ATTEMPTS: usize = 64;

/// What the registry remembers about a player between connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub player_id: PlayerId,
    pub nickname: String,
    /// The room the player last joined, if still seated there.
    pub room_id: Option<RoomId>,
}

/// Result of a leave request. Leaving is idempotent.
#[derive(Debug)]
pub enum Departure {
    /// The room or the seat did not exist.
    Absent,
    /// The player left; others remain.
    Left(Arc<Room>),
    /// The player was the last one out and the room was deleted.
    Closed,
}

/// Owns every room for the process lifetime.
///
/// Constructed by the server entry point and shared as `Arc<Registry>`.
#[derive(Debug)]
pub struct Registry {
    config: TableConfig,
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    players: RwLock<HashMap<PlayerId, Profile>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

impl Registry {
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            rooms: RwLock::new(HashMap::new()),
            players: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Creates an empty Waiting room under a fresh numeric code.
    ///
    /// Codes are drawn at random and redrawn on collision.
    ///
    /// # Errors
    /// `IdSpaceExhausted` if every code of the configured length is taken.
    pub fn create_room(&self) -> Result<Arc<Room>, RoomError> {
        self.create_room_with(&mut rand::rng())
    }

    pub fn create_room_with<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<Arc<Room>, RoomError> {
        let range = self.config.room_id_range();
        let mut rooms = self.rooms.write();

        let mut chosen = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = RoomId::new(rng.random_range(range.clone()).to_string());
            if !rooms.contains_key(&candidate) {
                chosen = Some(candidate);
                break;
            }
            tracing::debug!(room_id = %candidate, "room id collision, redrawing");
        }
        // A crowded code space: walk it from a random point instead.
        let room_id = match chosen {
            Some(id) => id,
            None => {
                let start = rng.random_range(range.clone());
                let span = range.end() - range.start() + 1;
                (0..span)
                    .map(|offset| {
                        range.start() + (start - range.start() + offset) % span
                    })
                    .map(|n| RoomId::new(n.to_string()))
                    .find(|id| !rooms.contains_key(id))
                    .ok_or(RoomError::IdSpaceExhausted)?
            }
        };

        let room = Arc::new(Room::new(room_id.clone(), self.config.clone()));
        rooms.insert(room_id.clone(), Arc::clone(&room));
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        Ok(room)
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.read().get(room_id).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<Profile> {
        self.players.read().get(player_id).cloned()
    }

    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Seats a player in a room, or rebinds their connection if they are
    /// already seated there, and indexes them for reconnection.
    ///
    /// # Errors
    /// `NotFound` if the room does not exist, `RoomFull` if no seat is free.
    pub fn join_room(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        nickname: &str,
        outbox: Option<Outbox>,
    ) -> Result<(Arc<Room>, JoinOutcome), RoomError> {
        // Held across the join so a concurrent leave cannot delete the room
        // between lookup and seating.
        let rooms = self.rooms.read();
        let room = rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let outcome = room.join(player_id, nickname, outbox)?;
        let nickname = room.nickname(player_id).unwrap_or_default();

        self.players.write().insert(
            player_id.clone(),
            Profile {
                player_id: player_id.clone(),
                nickname,
                room_id: Some(room_id.clone()),
            },
        );
        Ok((room, outcome))
    }

    /// Removes a player from a room, deleting the room once it is empty.
    pub fn leave_room(&self, room_id: &RoomId, player_id: &PlayerId) -> Departure {
        let mut rooms = self.rooms.write();
        let Some(room) = rooms.get(room_id).cloned() else {
            return Departure::Absent;
        };
        if room.remove_player(player_id).is_none() {
            return Departure::Absent;
        }

        {
            let mut players = self.players.write();
            let here = players
                .get(player_id)
                .is_some_and(|p| p.room_id.as_ref() == Some(room_id));
            if here {
                players.remove(player_id);
            }
        }

        if room.is_empty() {
            rooms.remove(room_id);
            let age_secs = room
                .created_at()
                .elapsed()
                .map(|age| age.as_secs())
                .unwrap_or_default();
            tracing::info!(%room_id, rooms = rooms.len(), age_secs, "room deleted");
            Departure::Closed
        } else {
            Departure::Left(room)
        }
    }

    /// Unbinds a closed connection from every seat still holding it.
    ///
    /// Players keep their seats and hands; only the dead outbox is
    /// dropped. Returns how many seats were detached.
    pub fn disconnect(&self, conn_id: ConnectionId) -> usize {
        let rooms = self.rooms.read();
        let detached: usize = rooms
            .values()
            .map(|room| room.detach_connection(conn_id))
            .sum();
        if detached > 0 {
            tracing::debug!(%conn_id, seats = detached, "connection released");
        }
        detached
    }

    /// Records a connect handshake.
    ///
    /// Creates the profile on first contact, otherwise refreshes the
    /// nickname. A player still seated in their last room gets the new
    /// connection bound there; that room is returned.
    pub fn connect_player(
        &self,
        player_id: &PlayerId,
        nickname: &str,
        outbox: Option<Outbox>,
    ) -> Option<Arc<Room>> {
        let rooms = self.rooms.read();
        let room_id = {
            let mut players = self.players.write();
            let profile = players.entry(player_id.clone()).or_insert_with(|| {
                tracing::info!(%player_id, "player registered");
                Profile {
                    player_id: player_id.clone(),
                    nickname: nickname.to_owned(),
                    room_id: None,
                }
            });
            if !nickname.is_empty() {
                profile.nickname = nickname.to_owned();
            }
            profile.room_id.clone()
        };

        let room = rooms.get(&room_id?)?.clone();
        if !room.contains(player_id) {
            return None;
        }
        // Seat checked above; the rooms read lock holds off any leave.
        if !nickname.is_empty() {
            if let Err(e) = room.rename(player_id, nickname) {
                tracing::debug!(%player_id, error = %e, "rename on connect failed");
            }
        }
        if let Some(outbox) = outbox {
            if let Err(e) = room.attach(player_id, outbox) {
                tracing::debug!(%player_id, error = %e, "rebind on connect failed");
            }
        }
        tracing::debug!(room_id = %room.id(), %player_id, "connection rebound");
        Some(room)
    }
}
