//! Command dispatcher.
//!
//! Every user intent takes the same path: build the payload, attach the
//! session, send it, then reconcile the store with whatever state comes back.
//! The client never checks a move itself; the server's answer is the truth.

use reqwest::{StatusCode, Url};
use solitaire::{
    GameState, MoveRequest, PileRef, WireError,
    messages::{Endpoint, MovePayload},
};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;

use crate::{
    api_client::{RequestBody, Transport, TransportError},
    session::SessionManager,
    store::{Field, GameStore, ReconcileOutcome, StoreError, Ticket},
};

/// Dispatch errors. None of them are fatal; the store is untouched and the
/// next intent can be sent as usual.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request never got an answer
    #[error(transparent)]
    Transport(TransportError),

    /// The server refused the request
    #[error("Server rejected {intent} ({status}): {message}")]
    Server {
        intent: Intent,
        status: StatusCode,
        message: String,
    },

    /// The answer wasn't a valid game state
    #[error("Malformed response to {intent}: {source}")]
    Malformed {
        intent: Intent,
        #[source]
        source: WireError,
    },

    /// The answer was a game state the store refused to hold
    #[error("Inconsistent response to {intent}: {source}")]
    Inconsistent {
        intent: Intent,
        #[source]
        source: StoreError,
    },
}

impl DispatchError {
    fn from_transport(intent: Intent, error: TransportError) -> Self {
        match error {
            TransportError::Server { status, message } => Self::Server {
                intent,
                status,
                message,
            },
            TransportError::Malformed(source) => Self::Malformed { intent, source },
            network @ TransportError::Network(_) => Self::Transport(network),
        }
    }
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Something the player asked the server to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Intent {
    FetchState,
    NewGame,
    Move(MoveRequest),
    FlipStock,
    Undo,
    FoundationAutoplay,
}

impl Intent {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::FetchState => Endpoint::State,
            Self::NewGame => Endpoint::NewGame,
            Self::Move(_) => Endpoint::Move,
            Self::FlipStock => Endpoint::FlipStock,
            Self::Undo => Endpoint::UndoMove,
            Self::FoundationAutoplay => Endpoint::FoundationCard,
        }
    }

    /// Body for the request. `GET /state` has none; every other intent
    /// sends at least `{}`.
    pub fn body(&self) -> Option<RequestBody> {
        match self {
            Self::FetchState => None,
            Self::Move(request) => Some(RequestBody::Move(MovePayload::from(*request))),
            _ => Some(RequestBody::Empty {}),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchState => write!(f, "fetch state"),
            Self::NewGame => write!(f, "new game"),
            Self::Move(request) => write!(f, "move {request}"),
            Self::FlipStock => write!(f, "flip stock"),
            Self::Undo => write!(f, "undo"),
            Self::FoundationAutoplay => write!(f, "foundation autoplay"),
        }
    }
}

/// Whether any request is still waiting on the server.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatcherStatus {
    Idle,
    AwaitingResponse,
}

/// How a successful intent landed in the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DispatchOutcome {
    pub intent: Intent,
    /// Store revision after reconciliation.
    pub revision: u64,
    /// False when the server answered with the state the store already had,
    /// which is how an illegal move shows up.
    pub changed: bool,
    pub fields: Vec<Field>,
    /// A response to a later request was applied first, so this one was
    /// dropped.
    pub stale: bool,
}

/// Decrements the in-flight count however the request ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sends intents to the server and reconciles the answers.
pub struct Dispatcher {
    store: Arc<GameStore>,
    session: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    base_url: Url,
    in_flight: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<GameStore>,
        session: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        base_url: Url,
    ) -> Self {
        Self {
            store,
            session,
            transport,
            base_url,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn status(&self) -> DispatcherStatus {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            DispatcherStatus::Idle
        } else {
            DispatcherStatus::AwaitingResponse
        }
    }

    pub fn store(&self) -> &Arc<GameStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Endpoint URL under the base, keeping any path prefix the base has.
    fn endpoint_url(&self, endpoint: Endpoint) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{}", url.path().trim_end_matches('/'), endpoint.path());
        url.set_path(&path);
        url
    }

    /// Fetch the current state. Used once at startup.
    pub async fn request_state(&self) -> DispatchResult<DispatchOutcome> {
        self.dispatch(Intent::FetchState).await
    }

    pub async fn request_new_game(&self) -> DispatchResult<DispatchOutcome> {
        self.dispatch(Intent::NewGame).await
    }

    /// Ask the server to move the top of `from` onto `to`. Legality is the
    /// server's call.
    pub async fn request_move(&self, from: PileRef, to: PileRef) -> DispatchResult<DispatchOutcome> {
        self.dispatch(Intent::Move(MoveRequest { from, to })).await
    }

    pub async fn request_flip_stock(&self) -> DispatchResult<DispatchOutcome> {
        self.dispatch(Intent::FlipStock).await
    }

    pub async fn request_undo(&self) -> DispatchResult<DispatchOutcome> {
        self.dispatch(Intent::Undo).await
    }

    pub async fn request_foundation_autoplay(&self) -> DispatchResult<DispatchOutcome> {
        self.dispatch(Intent::FoundationAutoplay).await
    }

    async fn dispatch(&self, intent: Intent) -> DispatchResult<DispatchOutcome> {
        let _in_flight = InFlight::enter(&self.in_flight);
        let ticket = self.store.issue_ticket();
        let endpoint = intent.endpoint();
        let body = intent.body();
        let url = self.session.attach(self.endpoint_url(endpoint)).await;

        tracing::debug!(%intent, ticket = ticket.value(), %url, "Dispatching intent");
        let state = self
            .transport
            .send(endpoint.method(), url, body)
            .await
            .map_err(|e| DispatchError::from_transport(intent, e))?;

        self.apply(intent, ticket, state).await
    }

    async fn apply(
        &self,
        intent: Intent,
        ticket: Ticket,
        state: GameState,
    ) -> DispatchResult<DispatchOutcome> {
        let adopted = state.clone();
        let outcome = self
            .store
            .reconcile_ordered(ticket, state)
            .await
            .map_err(|source| DispatchError::Inconsistent { intent, source })?;

        match outcome {
            ReconcileOutcome::Applied { revision, changed } => {
                if let Err(e) = self.session.adopt_from_response(ticket, &adopted).await {
                    tracing::warn!(error = %e, "Failed to update location with session");
                }
                if changed.is_empty() {
                    tracing::info!(%intent, "Server returned an unchanged state");
                }
                Ok(DispatchOutcome {
                    intent,
                    revision,
                    changed: !changed.is_empty(),
                    fields: changed,
                    stale: false,
                })
            }
            ReconcileOutcome::Stale { .. } => Ok(DispatchOutcome {
                intent,
                revision: self.store.revision().await,
                changed: false,
                fields: Vec::new(),
                stale: true,
            }),
        }
    }
}
