//! Plain-text board rendering for the terminal front-end.

use solitaire::{Card, Pile};
use std::fmt::Write;

use crate::store::{Board, GameStore, Hand, StoreView};

/// Derived values shown under the board.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    pub remaining_in_deck: usize,
    pub cards_in_play: usize,
    pub is_won: bool,
    pub player1_points: u32,
    pub player2_points: u32,
}

impl Summary {
    /// Derived values at the view's revision.
    pub async fn of(view: &StoreView<'_>) -> Self {
        Self {
            remaining_in_deck: view.remaining_in_deck().await,
            cards_in_play: view.cards_in_play().await,
            is_won: view.is_won().await,
            player1_points: view.points(Hand::Player1).await,
            player2_points: view.points(Hand::Player2).await,
        }
    }
}

/// Render the store's board and summary from one revision.
pub async fn render_store(store: &GameStore) -> String {
    let view = store.read_view().await;
    let summary = Summary::of(&view).await;
    render(view.board(), &summary)
}

fn top(pile: &Pile) -> String {
    pile.last()
        .map_or_else(|| "  --".to_string(), Card::to_string)
}

fn row(pile: &Pile) -> String {
    if pile.is_empty() {
        return "  --".to_string();
    }
    pile.iter().map(Card::to_string).collect::<Vec<_>>().join(" ")
}

/// Render the whole board.
pub fn render(board: &Board, summary: &Summary) -> String {
    let mut out = String::new();
    let session = board
        .game_state_id
        .as_ref()
        .map_or("offline", |id| id.as_str());

    // Writing to a String can't fail.
    let _ = writeln!(out, "Game {session}  Score {}", board.score);
    let _ = writeln!(
        out,
        "Stock [{:>2}]  Waste {}",
        board.stock.len(),
        top(&board.waste)
    );

    if !board.foundations.is_empty() {
        let foundations: Vec<String> = board.foundations.iter().map(top).collect();
        let _ = writeln!(out, "Foundations {}", foundations.join(" "));
    }
    for (i, tableau) in board.tableaus.iter().enumerate() {
        let _ = writeln!(out, "  T{i} {}", row(tableau));
    }

    for (hand, points) in [
        (Hand::Player1, summary.player1_points),
        (Hand::Player2, summary.player2_points),
    ] {
        let cards = board.hand(hand);
        if !cards.is_empty() {
            let _ = writeln!(out, "{hand} ({points} pts): {}", row(cards));
        }
    }

    let _ = write!(
        out,
        "{} left in deck, {} in play",
        summary.remaining_in_deck, summary.cards_in_play
    );
    if summary.is_won {
        out.push_str("  *** You won! ***");
    }
    out
}
