//! Card and deck model.
//!
//! This module provides the value types shared by every layer of the client:
//! - Suits, ranks, and cards with their fixed point values
//! - Pile addressing (`stock`, `waste`, `foundation[i]`, `tableau[i]`)
//! - The server-authoritative `GameState` aggregate
//! - Deck construction and Fisher-Yates shuffling

pub mod constants;
pub mod entities;
pub mod errors;
pub mod functional;

pub use errors::EntityError;
