//! Table configuration.

use serde::{Deserialize, Serialize};

use crate::RoomError;

/// Cards in a standard deck.
const DECK_SIZE: usize = 52;

/// Seat and hand limits shared by every room in a registry.
///
/// `max_players × max_hand_cards` may not exceed the deck size, so a hand
/// can never run the deck dry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Seats per room.
    pub max_players: usize,

    /// Cards a single hand may hold.
    pub max_hand_cards: usize,

    /// Digits in a generated room code.
    pub room_id_digits: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_players: 6,
            max_hand_cards: 8,
            room_id_digits: 5,
        }
    }
}

impl TableConfig {
    /// Checks the limits and returns the config unchanged if usable.
    ///
    /// # Errors
    /// Returns `RoomError::InvalidConfig` when a limit is zero, a hand
    /// cannot hold the opening deal, seats × cards exceeds the deck, or
    /// the room code length is outside `1..=9`.
    pub fn validated(self) -> Result<Self, RoomError> {
        if self.max_players == 0 {
            return Err(RoomError::InvalidConfig(
                "max_players must be at least 1".into(),
            ));
        }
        if self.max_hand_cards < 2 {
            return Err(RoomError::InvalidConfig(
                "max_hand_cards must be at least 2".into(),
            ));
        }
        let needed = self.max_players.saturating_mul(self.max_hand_cards);
        if needed > DECK_SIZE {
            return Err(RoomError::InvalidConfig(format!(
                "{} players x {} cards needs {needed} cards, deck has {DECK_SIZE}",
                self.max_players, self.max_hand_cards
            )));
        }
        if !(1..=9).contains(&self.room_id_digits) {
            return Err(RoomError::InvalidConfig(format!(
                "room_id_digits must be 1..=9, got {}",
                self.room_id_digits
            )));
        }
        Ok(self)
    }

    /// Inclusive range of numeric room codes, e.g. `10000..=99999`.
    pub(crate) fn room_id_range(&self) -> std::ops::RangeInclusive<u64> {
        let digits = self.room_id_digits.clamp(1, 9);
        let low = if digits == 1 { 1 } else { 10u64.pow(digits - 1) };
        low..=10u64.pow(digits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_config_default() {
        let config = TableConfig::default();
        assert_eq!(config.max_players, 6);
        assert_eq!(config.max_hand_cards, 8);
        assert_eq!(config.room_id_digits, 5);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_table_config_rejects_overdrawn_deck() {
        let config = TableConfig {
            max_players: 7,
            ..TableConfig::default()
        };
        assert!(matches!(
            config.validated(),
            Err(RoomError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_table_config_rejects_zero_limits() {
        for config in [
            TableConfig {
                max_players: 0,
                ..TableConfig::default()
            },
            TableConfig {
                max_hand_cards: 1,
                ..TableConfig::default()
            },
            TableConfig {
                room_id_digits: 0,
                ..TableConfig::default()
            },
            TableConfig {
                room_id_digits: 10,
                ..TableConfig::default()
            },
        ] {
            assert!(config.validated().is_err());
        }
    }

    #[test]
    fn test_room_id_range() {
        assert_eq!(TableConfig::default().room_id_range(), 10000..=99999);
        let one = TableConfig {
            room_id_digits: 1,
            ..TableConfig::default()
        };
        assert_eq!(one.room_id_range(), 1..=9);
    }
}
