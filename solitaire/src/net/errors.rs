//! Wire error types for decoding server responses.

use thiserror::Error;

use crate::game::EntityError;

/// Errors that can occur while turning a response body into a game state
#[derive(Debug, Error)]
pub enum WireError {
    /// Body wasn't the expected JSON shape
    #[error("Failed to decode game state: {0}")]
    Decode(#[from] serde_json::Error),

    /// Body decoded but described an impossible card or session
    #[error("Invalid game state: {0}")]
    Invalid(#[from] EntityError),
}

/// Result type for wire operations
pub type Result<T> = std::result::Result<T, WireError>;
