//! Cards and hand scoring.

use std::fmt;

/// A card suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

    /// Lowercase name used in card tokens.
    pub fn name(self) -> &'static str {
        match self {
            Self::Club => "club",
            Self::Diamond => "diamond",
            Self::Heart => "heart",
            Self::Spade => "spade",
        }
    }
}

/// A card rank, numbered 1 (ace) through 13 (king).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Rank {
    Ace = 1,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Rank number, 1..=13.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Rank as it appears in a card token: `A`, `2`..`10`, `J`, `Q`, `K`.
    pub fn symbol(self) -> String {
        match self {
            Self::Ace => "A".into(),
            Self::Jack => "J".into(),
            Self::Queen => "Q".into(),
            Self::King => "K".into(),
            other => other.number().to_string(),
        }
    }
}

/// An immutable playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// Face value: 10 for J/Q/K, otherwise the rank number (ace is 1).
    pub fn value(&self) -> u32 {
        match self.rank {
            Rank::Jack | Rank::Queen | Rank::King => 10,
            other => u32::from(other.number()),
        }
    }

    /// Wire token, e.g. `pk-spadeA` or `pk-heart10`.
    pub fn token(&self) -> String {
        format!("pk-{}{}", self.suit.name(), self.rank.symbol())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Best total for a hand.
///
/// Every ace starts at 11; while the total is over 21 and an ace is still
/// counted high, that ace drops to 1.
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut total: u32 = cards.iter().map(Card::value).sum();
    let mut high_aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
    total += 10 * high_aces as u32;

    while total > 21 && high_aces > 0 {
        total -= 10;
        high_aces -= 1;
    }
    total
}

pub fn is_bust(cards: &[Card]) -> bool {
    hand_value(cards) > 21
}

/// Two cards totalling 21.
pub fn is_blackjack(cards: &[Card]) -> bool {
    cards.len() == 2 && hand_value(cards) == 21
}
