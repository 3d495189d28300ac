//! # Solitaire
//!
//! Card model and wire protocol for a solitaire game whose rules live on a
//! remote server.
//!
//! The client never decides whether a move is legal. It sends intent and
//! mirrors whatever [`GameState`](game::entities::GameState) the server
//! answers with, so this crate only carries values:
//!
//! - [`game`]: suits, ranks, cards, piles, deck construction, and shuffling
//! - [`net`]: the JSON shapes the server speaks and conversions into [`game`]
//!
//! ## Example
//!
//! ```
//! use solitaire::game::functional::{build_deck, hand_points, shuffle_thread};
//!
//! let mut deck = build_deck();
//! shuffle_thread(&mut deck);
//! assert_eq!(deck.len(), 52);
//! assert_eq!(hand_points(&deck), 340);
//! ```

/// Card and deck model.
pub mod game;
pub use game::{
    EntityError,
    constants::{self, DECK_SIZE},
    entities::{self, Card, GameState, MoveRequest, Pile, PileKind, PileRef, Rank, SessionId, Suit},
    functional,
};

/// Wire protocol for the game server.
pub mod net;
pub use net::{errors::WireError, messages};
