//! Wire protocol shared by the client and any server speaking the same
//! HTTP/JSON contract.

/// Wire error types.
pub mod errors;

/// Request and response bodies, routes, and conversions to the card model.
pub mod messages;
