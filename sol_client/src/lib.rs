//! Synchronizing client for a server-authoritative solitaire game.
//!
//! The pieces are built once and shared by `Arc`:
//!
//! - [`store::GameStore`] mirrors the server's game state and notifies
//!   subscribers when it changes
//! - [`session::SessionManager`] keeps the session id in sync with the
//!   resumable location
//! - [`dispatcher::Dispatcher`] sends intents and reconciles the answers
//! - [`interaction::InteractionAdapter`] turns drag gestures into moves

pub mod api_client;
pub mod commands;
pub mod computed;
pub mod config;
pub mod dispatcher;
pub mod interaction;
pub mod logging;
pub mod session;
pub mod store;
pub mod view;
