//! Game engine and room management for twentyone.
//!
//! Rooms are shared aggregates: each [`Room`] guards its roster, status and
//! deck behind one reader/writer lock, and every operation runs to
//! completion synchronously under that lock. The [`Registry`] is the
//! process-wide directory of rooms and known players.
//!
//! # Key types
//!
//! - [`Card`], [`Deck`], [`hand_value`]: pure card logic
//! - [`Player`]: one seat's hand, status, and optional live connection
//! - [`Room`]: the Waiting → Playing → Ended state machine
//! - [`Registry`]: creates and tears down rooms, indexes players
//! - [`TableConfig`]: seat and hand limits

mod card;
mod config;
mod deck;
mod error;
mod manager;
mod player;
mod room;

pub use card::{Card, Rank, Suit, hand_value, is_blackjack, is_bust};
pub use config::TableConfig;
pub use deck::Deck;
pub use error::RoomError;
pub use manager::{Departure, Profile, Registry};
pub use player::Player;
pub use room::{JoinOutcome, Room};

pub use twentyone_protocol::{PlayerStatus, RoomStatus};
