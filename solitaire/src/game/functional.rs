//! Pure deck operations: construction, valuation, and shuffling.

use rand::Rng;

use super::{
    entities::{Card, Rank, Suit},
    errors::Result,
};

/// Points a rank is worth. Aces are 1, pips their face number, and
/// jack/queen/king 10.
pub fn point_value(rank: Rank) -> u8 {
    rank.points()
}

/// Points for a raw rank number (1 = ace ... 13 = king).
///
/// # Errors
///
/// Returns [`EntityError::InvalidRank`](super::errors::EntityError::InvalidRank)
/// if `rank` is outside `1..=13`.
pub fn point_value_of(rank: u8) -> Result<u8> {
    Rank::try_from(rank).map(point_value)
}

/// Total points held by a hand.
pub fn hand_points(cards: &[Card]) -> u32 {
    cards.iter().map(|card| u32::from(card.points())).sum()
}

/// A fresh, unshuffled 52-card deck, suit-major and rank-minor.
pub fn build_deck() -> Vec<Card> {
    Suit::ALL
        .into_iter()
        .flat_map(|suit| Rank::ALL.into_iter().map(move |rank| Card::new(rank, suit)))
        .collect()
}

/// `count` standard decks back to back. Two decks make the forty-thieves
/// layout.
pub fn build_decks(count: usize) -> Vec<Card> {
    let mut cards = Vec::with_capacity(count * super::constants::DECK_SIZE);
    for _ in 0..count {
        cards.extend(build_deck());
    }
    cards
}

/// Fisher-Yates shuffle in place.
///
/// Walks from the last index down to 1, swapping each element with one drawn
/// uniformly from the not-yet-visited prefix (inclusive). Every permutation is
/// equally likely given a uniform `rng`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// [`shuffle`] with the thread-local generator.
pub fn shuffle_thread<T>(items: &mut [T]) {
    shuffle(items, &mut rand::rng());
}
