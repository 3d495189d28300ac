//! Error types for card and pile values.

use thiserror::Error;

/// Errors raised when raw values don't describe a valid card, pile, or session.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EntityError {
    /// Rank outside of ace (1) through king (13)
    #[error("invalid rank {0}, expected 1..=13")]
    InvalidRank(u8),

    /// Suit code outside of the four known suits
    #[error("invalid suit code {0}, expected 0..=3")]
    InvalidSuit(u8),

    /// Pile name that isn't stock, waste, foundation, or tableau
    #[error("unknown pile name '{0}'")]
    UnknownPile(String),

    /// Pile index that isn't a non-negative integer
    #[error("invalid pile index '{0}'")]
    InvalidPileIndex(String),

    /// Pile reference that isn't of the form `<pile>:<index>`
    #[error("invalid pile reference '{0}', expected '<pile>:<index>'")]
    InvalidPileRef(String),

    /// Session identifiers can't be blank
    #[error("session id is empty")]
    EmptySessionId,
}

/// Result type for entity conversions
pub type Result<T> = std::result::Result<T, EntityError>;
