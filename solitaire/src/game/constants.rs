/// Number of suits in a standard deck.
pub const NUM_SUITS: usize = 4;

/// Number of ranks per suit.
pub const NUM_RANKS: usize = 13;

/// Cards in one standard deck.
pub const DECK_SIZE: usize = NUM_SUITS * NUM_RANKS;

/// Foundations in a single-deck Klondike layout.
pub const NUM_FOUNDATIONS: usize = 4;

/// Tableaus in a single-deck Klondike layout.
pub const NUM_TABLEAUS: usize = 7;

/// Point value shared by the face cards (and the ten).
pub const FACE_CARD_POINTS: u8 = 10;
