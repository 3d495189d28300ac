use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{
    constants::FACE_CARD_POINTS,
    errors::{EntityError, Result},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Hearts,
    Clubs,
    Spades,
    Diamonds,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Clubs, Suit::Spades, Suit::Diamonds];

    pub fn is_red(&self) -> bool {
        matches!(self, Self::Hearts | Self::Diamonds)
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "♥",
            Self::Clubs => "♣",
            Self::Spades => "♠",
            Self::Diamonds => "♦",
        };
        write!(f, "{repr}")
    }
}

/// Card ranks, ace low. The discriminant is the rank number.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
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

    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Points this rank is worth in a hand. Suits never matter.
    pub fn points(&self) -> u8 {
        match self {
            Self::Jack | Self::Queen | Self::King => FACE_CARD_POINTS,
            rank => rank.number(),
        }
    }
}

impl TryFrom<u8> for Rank {
    type Error = EntityError;

    fn try_from(value: u8) -> Result<Self> {
        value
            .checked_sub(1)
            .and_then(|idx| Self::ALL.get(usize::from(idx)))
            .copied()
            .ok_or(EntityError::InvalidRank(value))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ace => write!(f, "A"),
            Self::Jack => write!(f, "J"),
            Self::Queen => write!(f, "Q"),
            Self::King => write!(f, "K"),
            rank => write!(f, "{}", rank.number()),
        }
    }
}

/// A single playing card. Cards carry no identity of their own; a card is
/// known by the pile and position it sits in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { suit, rank }
    }

    pub fn points(&self) -> u8 {
        self.rank.points()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = format!("{}/{}", self.rank, self.suit);
        write!(f, "{repr:>4}")
    }
}

/// An ordered run of cards, bottom first.
pub type Pile = Vec<Card>;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PileKind {
    Stock,
    Waste,
    Foundation,
    Tableau,
}

impl PileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Waste => "waste",
            Self::Foundation => "foundation",
            Self::Tableau => "tableau",
        }
    }
}

impl fmt::Display for PileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PileKind {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(Self::Stock),
            "waste" => Ok(Self::Waste),
            "foundation" => Ok(Self::Foundation),
            "tableau" => Ok(Self::Tableau),
            _ => Err(EntityError::UnknownPile(s.to_string())),
        }
    }
}

/// Addresses one pile on the board: its kind, plus which pile of that kind.
///
/// Stock and waste are singletons; their index is carried on the wire but
/// ignored by the server.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PileRef {
    pub kind: PileKind,
    pub index: usize,
}

impl PileRef {
    pub fn new(kind: PileKind, index: usize) -> Self {
        Self { kind, index }
    }

    pub fn stock() -> Self {
        Self::new(PileKind::Stock, 0)
    }

    pub fn waste() -> Self {
        Self::new(PileKind::Waste, 0)
    }

    pub fn foundation(index: usize) -> Self {
        Self::new(PileKind::Foundation, index)
    }

    pub fn tableau(index: usize) -> Self {
        Self::new(PileKind::Tableau, index)
    }

    /// Build a reference from the pile/index attributes a drop target declares
    /// (`data-pile="tableau" data-index="3"`).
    pub fn from_attributes(pile: &str, index: &str) -> Result<Self> {
        let kind = pile.parse()?;
        let index = index
            .trim()
            .parse()
            .map_err(|_| EntityError::InvalidPileIndex(index.to_string()))?;
        Ok(Self { kind, index })
    }
}

impl fmt::Display for PileRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.index)
    }
}

impl FromStr for PileRef {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self> {
        let (pile, index) = s
            .split_once(':')
            .ok_or_else(|| EntityError::InvalidPileRef(s.to_string()))?;
        Self::from_attributes(pile, index)
    }
}

/// Opaque token the server uses to correlate a client with its game state.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SessionId(String);

impl SessionId {
    /// Blank tokens are rejected. Anything else is kept byte for byte.
    pub fn new(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(EntityError::EmptySessionId);
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Intent to move the top card of one pile onto another.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MoveRequest {
    pub from: PileRef,
    pub to: PileRef,
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// The complete, server-authoritative state of one game.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameState {
    pub stock: Pile,
    pub waste: Pile,
    pub foundations: Vec<Pile>,
    pub tableaus: Vec<Pile>,
    pub score: i64,
    pub game_state_id: SessionId,
}

impl GameState {
    /// Every card on the board, across all piles.
    pub fn total_cards(&self) -> usize {
        self.stock.len()
            + self.waste.len()
            + self.foundations.iter().map(Vec::len).sum::<usize>()
            + self.tableaus.iter().map(Vec::len).sum::<usize>()
    }

    /// Cards not yet promoted to a foundation. The game is won at zero.
    pub fn cards_in_play(&self) -> usize {
        self.stock.len() + self.waste.len() + self.tableaus.iter().map(Vec::len).sum::<usize>()
    }

    pub fn pile(&self, pile: PileRef) -> Option<&Pile> {
        match pile.kind {
            PileKind::Stock => Some(&self.stock),
            PileKind::Waste => Some(&self.waste),
            PileKind::Foundation => self.foundations.get(pile.index),
            PileKind::Tableau => self.tableaus.get(pile.index),
        }
    }
}
