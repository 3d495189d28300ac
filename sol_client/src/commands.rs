use solitaire::{EntityError, PileRef};
use std::fmt;

use crate::store::Hand;

/// A line of player input, parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    State,
    NewGame,
    Move { from: PileRef, to: PileRef },
    Flip,
    Undo,
    Auto,
    Show,
    Link,
    Help,
    Quit,
    /// Offline only: deal cards from the stock into a hand.
    Deal { hand: Hand, count: usize },
    /// Offline only: gather the hands and reshuffle.
    Shuffle,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Move command with the wrong number of arguments.
    MoveArity(usize),
    /// Move command naming a bad pile or index.
    InvalidPile(EntityError),
    /// Deal command naming an unknown hand.
    InvalidHand(String),
    /// Deal command with a count that isn't a number.
    InvalidCount(String),
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveArity(given) => write!(
                f,
                "Move takes 4 arguments, got {given} (e.g., 'move tableau 0 foundation 2')"
            ),
            Self::InvalidPile(e) => write!(f, "{e}"),
            Self::InvalidHand(value) => {
                write!(f, "Unknown hand '{value}'. Use 'p1' or 'p2'")
            }
            Self::InvalidCount(value) => write!(
                f,
                "Invalid card count '{value}'. Must be a number (e.g., 'deal p1 5')"
            ),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Type 'help' to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<EntityError> for ParseError {
    fn from(e: EntityError) -> Self {
        Self::InvalidPile(e)
    }
}

pub const HELP: &str = "\
Commands:
  state                          Refresh the board from the server
  new                            Start a new game
  move <pile> <i> <pile> <j>     Move the top card, e.g. 'move waste 0 tableau 3'
  flip                           Flip the stock onto the waste
  undo                           Undo the last move
  auto                           Play one card onto the foundations
  show                           Redraw the board
  link                           Print the link that resumes this game
  help                           Show this help
  quit                           Leave
Offline only:
  deal <p1|p2> <n>               Deal n cards from the stock to a hand
  shuffle                        Return the hands to the stock and shuffle
";

/// Parse a line of input into a [`Command`].
///
/// # Examples
///
/// ```
/// use sol_client::commands::{Command, parse_command};
/// use solitaire::PileRef;
///
/// assert_eq!(parse_command("flip"), Ok(Command::Flip));
/// assert_eq!(
///     parse_command("move waste 0 tableau 3"),
///     Ok(Command::Move { from: PileRef::waste(), to: PileRef::tableau(3) })
/// );
/// ```
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let trimmed = input.trim();

    match trimmed.to_ascii_lowercase().as_str() {
        "state" | "refresh" => return Ok(Command::State),
        "new" => return Ok(Command::NewGame),
        "flip" => return Ok(Command::Flip),
        "undo" => return Ok(Command::Undo),
        "auto" => return Ok(Command::Auto),
        "show" => return Ok(Command::Show),
        "link" => return Ok(Command::Link),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "shuffle" => return Ok(Command::Shuffle),
        _ => {}
    }

    let parts: Vec<&str> = trimmed.split_ascii_whitespace().collect();
    let verb = parts.first().map(|verb| verb.to_ascii_lowercase());
    match verb.as_deref() {
        Some("move") => parse_move_command(&parts[1..]),
        Some("deal") => parse_deal_command(&parts[1..]),
        _ => Err(ParseError::UnrecognizedCommand(trimmed.to_string())),
    }
}

/// Parse "move <pile> <index> <pile> <index>"
fn parse_move_command(args: &[&str]) -> Result<Command, ParseError> {
    match args {
        [from_pile, from_index, to_pile, to_index] => Ok(Command::Move {
            from: PileRef::from_attributes(from_pile, from_index)?,
            to: PileRef::from_attributes(to_pile, to_index)?,
        }),
        _ => Err(ParseError::MoveArity(args.len())),
    }
}

/// Parse "deal <p1|p2> [count]". Count defaults to one card.
fn parse_deal_command(args: &[&str]) -> Result<Command, ParseError> {
    let hand = match args.first().map(|hand| hand.to_ascii_lowercase()).as_deref() {
        Some("p1") | Some("1") => Hand::Player1,
        Some("p2") | Some("2") => Hand::Player2,
        Some(_) => return Err(ParseError::InvalidHand(args[0].to_string())),
        None => return Err(ParseError::InvalidHand(String::new())),
    };
    let count = match args.get(1) {
        Some(value) => value
            .parse()
            .map_err(|_| ParseError::InvalidCount(value.to_string()))?,
        None => 1,
    };
    Ok(Command::Deal { hand, count })
}
