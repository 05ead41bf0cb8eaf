//! A 52-card deck owned by one room for one hand.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::{Card, Rank, Suit};

/// An ordered pile of cards; [`deal`](Deck::deal) takes from the top (the
/// end of the sequence).
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// A freshly shuffled 52-card deck.
    pub fn new() -> Self {
        Self::shuffled(&mut rand::rng())
    }

    /// All 52 cards, unshuffled, clubs first.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        Self { cards }
    }

    pub fn shuffled<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::standard();
        deck.cards.shuffle(rng);
        deck
    }

    pub fn shuffled_with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::shuffled(&mut rng)
    }

    /// A deck in exactly the given order; the last card is dealt first.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Removes and returns the top card, or `None` if the deck is empty.
    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_new_deck_has_52_unique_cards() {
        let deck = Deck::new();
        assert_eq!(deck.remaining(), 52);
        let unique: HashSet<Card> = deck.cards().iter().copied().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn test_deal_shrinks_and_never_repeats() {
        let mut deck = Deck::new();
        let mut seen = HashSet::new();
        for left in (0..52).rev() {
            let card = deck.deal().expect("deck not empty yet");
            assert!(seen.insert(card), "{card} dealt twice");
            assert_eq!(deck.remaining(), left);
        }
        assert_eq!(deck.deal(), None);
    }

    #[test]
    fn test_deal_takes_from_the_end() {
        let first = Card::new(Suit::Heart, Rank::Two);
        let last = Card::new(Suit::Spade, Rank::King);
        let mut deck = Deck::from_cards(vec![first, last]);
        assert_eq!(deck.deal(), Some(last));
        assert_eq!(deck.deal(), Some(first));
        assert_eq!(deck.deal(), None);
    }

    #[test]
    fn test_shuffle_with_seed_is_deterministic() {
        let a = Deck::shuffled_with_seed(42);
        let b = Deck::shuffled_with_seed(42);
        assert_eq!(a.cards(), b.cards());
    }

    #[test]
    fn test_shuffle_with_different_seeds_differs() {
        let a = Deck::shuffled_with_seed(1);
        let b = Deck::shuffled_with_seed(2);
        assert_ne!(a.cards(), b.cards());
    }
}
