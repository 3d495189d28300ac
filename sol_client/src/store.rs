//! Local mirror of the server's game state.
//!
//! The store holds every game field (piles, score, session id) as part of one
//! copy-on-write [`Board`]. Server responses enter through a single entry
//! point, [`GameStore::reconcile`], which swaps the whole board under one write
//! lock so no reader ever sees a half-applied state. Subscribers are told
//! which fields changed after each swap, and derived values (points, cards
//! left in the stock) are recomputed lazily from the current revision.

use rand::Rng;
use solitaire::{Card, DECK_SIZE, GameState, Pile, SessionId, functional};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, mpsc};

use crate::computed::Computed;

/// Capacity of each subscriber's notification channel.
pub const SUBSCRIBER_CAPACITY: usize = 32;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A state would break card conservation across piles
    #[error("Card count mismatch: expected {expected} cards, got {actual}")]
    CardCountMismatch { expected: usize, actual: usize },

    /// Local mutations are disabled once the server owns the game
    #[error("Session {0} is active; local moves would diverge from the server")]
    SessionActive(SessionId),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Player hands used by the network-free demo mode.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Hand {
    Player1,
    Player2,
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Player1 => "player 1",
            Self::Player2 => "player 2",
        };
        write!(f, "{repr}")
    }
}

/// Independently observable containers in the store.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    Stock,
    Waste,
    Foundations,
    Tableaus,
    Score,
    GameStateId,
    Hands,
}

/// Everything the store mirrors, as one consistent value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Board {
    pub stock: Pile,
    pub waste: Pile,
    pub foundations: Vec<Pile>,
    pub tableaus: Vec<Pile>,
    pub score: i64,
    pub game_state_id: Option<SessionId>,
    pub player1: Pile,
    pub player2: Pile,
}

impl Board {
    fn from_state(state: GameState) -> Self {
        Self {
            stock: state.stock,
            waste: state.waste,
            foundations: state.foundations,
            tableaus: state.tableaus,
            score: state.score,
            game_state_id: Some(state.game_state_id),
            player1: Pile::new(),
            player2: Pile::new(),
        }
    }

    pub fn hand(&self, hand: Hand) -> &Pile {
        match hand {
            Hand::Player1 => &self.player1,
            Hand::Player2 => &self.player2,
        }
    }

    fn hand_mut(&mut self, hand: Hand) -> &mut Pile {
        match hand {
            Hand::Player1 => &mut self.player1,
            Hand::Player2 => &mut self.player2,
        }
    }

    /// Every card held anywhere on the board, hands included.
    pub fn total_cards(&self) -> usize {
        self.stock.len()
            + self.waste.len()
            + self.foundations.iter().map(Vec::len).sum::<usize>()
            + self.tableaus.iter().map(Vec::len).sum::<usize>()
            + self.player1.len()
            + self.player2.len()
    }

    /// Cards not yet on a foundation.
    pub fn cards_in_play(&self) -> usize {
        self.total_cards() - self.foundations.iter().map(Vec::len).sum::<usize>()
    }

    fn changed_fields(&self, next: &Board) -> Vec<Field> {
        let mut changed = Vec::new();
        if self.stock != next.stock {
            changed.push(Field::Stock);
        }
        if self.waste != next.waste {
            changed.push(Field::Waste);
        }
        if self.foundations != next.foundations {
            changed.push(Field::Foundations);
        }
        if self.tableaus != next.tableaus {
            changed.push(Field::Tableaus);
        }
        if self.score != next.score {
            changed.push(Field::Score);
        }
        if self.game_state_id != next.game_state_id {
            changed.push(Field::GameStateId);
        }
        if self.player1 != next.player1 || self.player2 != next.player2 {
            changed.push(Field::Hands);
        }
        changed
    }
}

/// Sent to subscribers after every change to the board.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreNotification {
    pub revision: u64,
    pub changed: Vec<Field>,
}

impl StoreNotification {
    pub fn touches(&self, field: Field) -> bool {
        self.changed.contains(&field)
    }
}

/// Issue-order sequence number for a request whose response will be
/// reconciled.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// What happened to a reconciled state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReconcileOutcome {
    /// The state replaced the board. `changed` is empty when it was identical.
    Applied { revision: u64, changed: Vec<Field> },
    /// A newer response was already applied; this one was dropped.
    Stale { ticket: Ticket, latest: Ticket },
}

struct StoreState {
    board: Arc<Board>,
    revision: u64,
    last_applied: Ticket,
}

struct DerivedCells {
    player1_points: Computed<Board, u32>,
    player2_points: Computed<Board, u32>,
    remaining_in_deck: Computed<Board, usize>,
    cards_in_play: Computed<Board, usize>,
}

impl DerivedCells {
    fn new() -> Self {
        Self {
            player1_points: Computed::new("player1_points", |board: &Board| {
                functional::hand_points(&board.player1)
            }),
            player2_points: Computed::new("player2_points", |board: &Board| {
                functional::hand_points(&board.player2)
            }),
            remaining_in_deck: Computed::new("remaining_in_deck", |board: &Board| {
                board.stock.len()
            }),
            cards_in_play: Computed::new("cards_in_play", Board::cards_in_play),
        }
    }

    fn points(&self, hand: Hand) -> &Computed<Board, u32> {
        match hand {
            Hand::Player1 => &self.player1_points,
            Hand::Player2 => &self.player2_points,
        }
    }
}

/// The board and its derived values, pinned to one revision.
///
/// Reconciliation waits while a view is alive, so keep it short-lived.
pub struct StoreView<'a> {
    state: RwLockReadGuard<'a, StoreState>,
    derived: &'a DerivedCells,
}

impl StoreView<'_> {
    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub async fn points(&self, hand: Hand) -> u32 {
        self.derived
            .points(hand)
            .get(self.state.revision, &self.state.board)
            .await
    }

    pub async fn remaining_in_deck(&self) -> usize {
        self.derived
            .remaining_in_deck
            .get(self.state.revision, &self.state.board)
            .await
    }

    pub async fn cards_in_play(&self) -> usize {
        self.derived
            .cards_in_play
            .get(self.state.revision, &self.state.board)
            .await
    }

    pub async fn is_won(&self) -> bool {
        self.state.board.total_cards() > 0 && self.cards_in_play().await == 0
    }
}

/// Reactive store of the current game.
pub struct GameStore {
    state: RwLock<StoreState>,
    deck_size: Option<usize>,
    next_ticket: AtomicU64,
    subscribers: Mutex<Vec<mpsc::Sender<StoreNotification>>>,
    derived: DerivedCells,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new(Some(DECK_SIZE))
    }
}

impl GameStore {
    /// Create an empty store. `deck_size` is the card count every reconciled
    /// state must hold; `None` skips the check.
    pub fn new(deck_size: Option<usize>) -> Self {
        Self::with_board(Board::default(), deck_size)
    }

    /// Create a store for network-free play with `cards` as the stock.
    pub fn with_local_deck(cards: Vec<Card>) -> Self {
        let deck_size = Some(cards.len());
        let board = Board {
            stock: cards,
            ..Board::default()
        };
        Self::with_board(board, deck_size)
    }

    fn with_board(board: Board, deck_size: Option<usize>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                board: Arc::new(board),
                revision: 0,
                last_applied: Ticket(0),
            }),
            deck_size,
            next_ticket: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
            derived: DerivedCells::new(),
        }
    }

    pub fn deck_size(&self) -> Option<usize> {
        self.deck_size
    }

    /// Take the next ticket in issue order.
    pub fn issue_ticket(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::SeqCst))
    }

    fn check_conservation(&self, state: &GameState) -> StoreResult<()> {
        if let Some(expected) = self.deck_size {
            let actual = state.total_cards();
            if actual != expected {
                return Err(StoreError::CardCountMismatch { expected, actual });
            }
        }
        Ok(())
    }

    /// Replace the whole board with `state`.
    ///
    /// The swap is all-or-nothing: the state is validated first, then every
    /// field is replaced under one write lock. Local hands are cleared because
    /// the server now owns the game.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CardCountMismatch`] if `state` doesn't hold the
    /// configured number of cards. The board is left untouched.
    pub async fn reconcile(&self, state: GameState) -> StoreResult<ReconcileOutcome> {
        self.check_conservation(&state)?;
        let mut guard = self.state.write().await;
        let outcome = Self::apply(&mut guard, state);
        drop(guard);
        self.notify_if_changed(&outcome).await;
        Ok(outcome)
    }

    /// Like [`reconcile`](Self::reconcile), but drops `state` if a response to
    /// a later-issued request was already applied.
    ///
    /// # Errors
    ///
    /// Same as [`reconcile`](Self::reconcile).
    pub async fn reconcile_ordered(
        &self,
        ticket: Ticket,
        state: GameState,
    ) -> StoreResult<ReconcileOutcome> {
        self.check_conservation(&state)?;
        let mut guard = self.state.write().await;
        if ticket < guard.last_applied {
            let latest = guard.last_applied;
            tracing::warn!(
                ticket = ticket.value(),
                latest = latest.value(),
                "Dropping stale game state"
            );
            return Ok(ReconcileOutcome::Stale { ticket, latest });
        }
        guard.last_applied = ticket;
        let outcome = Self::apply(&mut guard, state);
        drop(guard);
        self.notify_if_changed(&outcome).await;
        Ok(outcome)
    }

    fn apply(guard: &mut StoreState, state: GameState) -> ReconcileOutcome {
        let next = Board::from_state(state);
        let changed = guard.board.changed_fields(&next);
        if !changed.is_empty() {
            guard.board = Arc::new(next);
            guard.revision += 1;
        }
        tracing::debug!(revision = guard.revision, ?changed, "Reconciled game state");
        ReconcileOutcome::Applied {
            revision: guard.revision,
            changed,
        }
    }

    async fn notify_if_changed(&self, outcome: &ReconcileOutcome) {
        if let ReconcileOutcome::Applied { revision, changed } = outcome
            && !changed.is_empty()
        {
            self.notify(StoreNotification {
                revision: *revision,
                changed: changed.clone(),
            })
            .await;
        }
    }

    /// Broadcast a change to all subscribers, pruning the ones that hung up.
    async fn notify(&self, notification: StoreNotification) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sender| match sender.try_send(notification.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    revision = notification.revision,
                    "Subscriber channel full, dropping notification"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Subscriber disconnected, removing");
                false
            }
        });
    }

    /// Receive a [`StoreNotification`] after every change.
    pub async fn subscribe(&self) -> mpsc::Receiver<StoreNotification> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().await.push(sender);
        receiver
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// A consistent view of every field at one revision.
    pub async fn snapshot(&self) -> Arc<Board> {
        self.state.read().await.board.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.state.read().await.revision
    }

    pub async fn stock(&self) -> Pile {
        self.snapshot().await.stock.clone()
    }

    pub async fn waste(&self) -> Pile {
        self.snapshot().await.waste.clone()
    }

    pub async fn foundations(&self) -> Vec<Pile> {
        self.snapshot().await.foundations.clone()
    }

    pub async fn tableaus(&self) -> Vec<Pile> {
        self.snapshot().await.tableaus.clone()
    }

    pub async fn score(&self) -> i64 {
        self.snapshot().await.score
    }

    pub async fn game_state_id(&self) -> Option<SessionId> {
        self.snapshot().await.game_state_id.clone()
    }

    pub async fn hand(&self, hand: Hand) -> Pile {
        self.snapshot().await.hand(hand).clone()
    }

    /// Hold the board at its current revision so the board and every derived
    /// value can be read without a reconciliation slipping in between.
    pub async fn read_view(&self) -> StoreView<'_> {
        StoreView {
            state: self.state.read().await,
            derived: &self.derived,
        }
    }

    /// Points held in a player's hand.
    pub async fn points(&self, hand: Hand) -> u32 {
        self.read_view().await.points(hand).await
    }

    /// Cards left to draw from the stock.
    pub async fn remaining_in_deck(&self) -> usize {
        self.read_view().await.remaining_in_deck().await
    }

    /// Cards outside the foundations.
    pub async fn cards_in_play(&self) -> usize {
        self.read_view().await.cards_in_play().await
    }

    /// Whether every card has reached a foundation.
    pub async fn is_won(&self) -> bool {
        self.read_view().await.is_won().await
    }

    /// Times each derived value has been recomputed, by name.
    pub fn derived_evaluations(&self) -> Vec<(&'static str, u64)> {
        let derived = &self.derived;
        vec![
            (derived.player1_points.name(), derived.player1_points.evaluations()),
            (derived.player2_points.name(), derived.player2_points.evaluations()),
            (derived.remaining_in_deck.name(), derived.remaining_in_deck.evaluations()),
            (derived.cards_in_play.name(), derived.cards_in_play.evaluations()),
        ]
    }

    /// Run a local-only mutation. Refused once a server session exists.
    async fn mutate_locally<T>(&self, mutate: impl FnOnce(&mut Board) -> T) -> StoreResult<T> {
        let mut guard = self.state.write().await;
        if let Some(session) = &guard.board.game_state_id {
            return Err(StoreError::SessionActive(session.clone()));
        }
        let before = guard.board.clone();
        let result = mutate(Arc::make_mut(&mut guard.board));
        let changed = before.changed_fields(&guard.board);
        if !changed.is_empty() {
            guard.revision += 1;
        }
        let outcome = ReconcileOutcome::Applied {
            revision: guard.revision,
            changed,
        };
        drop(guard);
        self.notify_if_changed(&outcome).await;
        Ok(result)
    }

    /// Deal up to `count` cards from the top of the stock into `hand`.
    /// Returns how many were dealt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionActive`] once the server owns the game.
    pub async fn deal(&self, hand: Hand, count: usize) -> StoreResult<usize> {
        self.mutate_locally(|board| {
            let count = count.min(board.stock.len());
            for _ in 0..count {
                if let Some(card) = board.stock.pop() {
                    board.hand_mut(hand).push(card);
                }
            }
            tracing::debug!(%hand, count, "Dealt cards locally");
            count
        })
        .await
    }

    /// Gather both hands back into the stock and shuffle it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionActive`] once the server owns the game.
    pub async fn new_local_game<R: Rng + ?Sized>(&self, rng: &mut R) -> StoreResult<()> {
        self.mutate_locally(|board| {
            for hand in [Hand::Player1, Hand::Player2] {
                while let Some(card) = board.hand_mut(hand).pop() {
                    board.stock.push(card);
                }
            }
            functional::shuffle(&mut board.stock, rng);
        })
        .await
    }
}
