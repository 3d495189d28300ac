//! Drag-and-drop bridge.
//!
//! A drag starts on a card's pile and ends on a drop target that declares
//! which pile it is. The adapter carries the source through the drag payload
//! and turns the drop into exactly one move request.

use solitaire::{EntityError, PileRef};
use std::{collections::HashMap, fmt, sync::Arc};

use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};

/// Media type the drag source is stored under.
pub const TRANSFER_FORMAT: &str = "text/plain";

/// Payload carried from drag start to drop, keyed by media type.
#[derive(Clone, Debug, Default)]
pub struct DataTransfer {
    data: HashMap<String, String>,
}

impl DataTransfer {
    pub fn set_data(&mut self, format: &str, data: impl Into<String>) {
        self.data.insert(format.to_string(), data.into());
    }

    /// Stored data for `format`, or an empty string.
    pub fn get_data(&self, format: &str) -> &str {
        self.data.get(format).map(String::as_str).unwrap_or_default()
    }
}

/// One drag/drop event as the UI delivers it.
#[derive(Clone, Debug, Default)]
pub struct DragEvent {
    pub data_transfer: DataTransfer,
    default_prevented: bool,
}

impl DragEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// What the player should be told after a drop.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Feedback {
    Moved,
    /// The server kept the board as it was.
    NoEffect,
    /// A newer answer had already arrived.
    Ignored,
    Failed(String),
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moved => write!(f, "Moved"),
            Self::NoEffect => write!(f, "Move had no effect"),
            Self::Ignored => write!(f, "Superseded by a newer update"),
            Self::Failed(message) => write!(f, "Move failed: {message}"),
        }
    }
}

impl From<Result<DispatchOutcome, DispatchError>> for Feedback {
    fn from(result: Result<DispatchOutcome, DispatchError>) -> Self {
        match result {
            Ok(outcome) if outcome.stale => Self::Ignored,
            Ok(outcome) if outcome.changed => Self::Moved,
            Ok(_) => Self::NoEffect,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Turns drag gestures into move requests.
pub struct InteractionAdapter {
    dispatcher: Arc<Dispatcher>,
}

impl InteractionAdapter {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Record the dragged card's pile in the event payload.
    pub fn on_drag_start(&self, event: &mut DragEvent, from: PileRef) {
        event.data_transfer.set_data(TRANSFER_FORMAT, from.to_string());
        tracing::trace!(%from, "Drag started");
    }

    /// Allow dropping here.
    pub fn on_drag_over(&self, event: &mut DragEvent) {
        event.prevent_default();
    }

    /// Send the move the drag described. Missing or garbled payloads fail
    /// without touching the network.
    pub async fn on_drop(&self, event: &mut DragEvent, to: PileRef) -> Feedback {
        event.prevent_default();
        let from = match read_source(&event.data_transfer) {
            Ok(from) => from,
            Err(e) => {
                tracing::warn!(error = %e, "Dropped without a valid drag source");
                return Feedback::Failed(e.to_string());
            }
        };
        self.dispatcher.request_move(from, to).await.into()
    }

    /// [`on_drop`](Self::on_drop) for a target described by its
    /// `data-pile`/`data-index` attributes.
    pub async fn on_drop_at(&self, event: &mut DragEvent, pile: &str, index: &str) -> Feedback {
        match PileRef::from_attributes(pile, index) {
            Ok(to) => self.on_drop(event, to).await,
            Err(e) => {
                event.prevent_default();
                Feedback::Failed(e.to_string())
            }
        }
    }
}

fn read_source(transfer: &DataTransfer) -> Result<PileRef, EntityError> {
    transfer.get_data(TRANSFER_FORMAT).parse()
}
