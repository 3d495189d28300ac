use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::super::game::{
    EntityError,
    entities::{Card, GameState, MoveRequest, Pile, PileKind, PileRef, Rank, SessionId, Suit},
};
use super::errors::Result;

/// Query parameter carrying the session token on every request and in the
/// shareable location.
pub const SESSION_QUERY_PARAM: &str = "gameStateID";

/// HTTP verbs the game server understands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
}

/// Every route the game server exposes. Each one answers with a full
/// [`WireGameState`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Endpoint {
    State,
    NewGame,
    Move,
    FlipStock,
    UndoMove,
    FoundationCard,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::State => "/state",
            Self::NewGame => "/newgame",
            Self::Move => "/move",
            Self::FlipStock => "/flipstock",
            Self::UndoMove => "/undomove",
            Self::FoundationCard => "/foundationcard",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::State => Method::Get,
            _ => Method::Post,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Card as the server encodes it. `Face` is zero-based (0 = ace ... 12 = king).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireCard {
    pub suit: u8,
    pub face: u8,
}

pub fn suit_code(suit: Suit) -> u8 {
    match suit {
        Suit::Clubs => 0,
        Suit::Diamonds => 1,
        Suit::Hearts => 2,
        Suit::Spades => 3,
    }
}

pub fn suit_from_code(code: u8) -> std::result::Result<Suit, EntityError> {
    match code {
        0 => Ok(Suit::Clubs),
        1 => Ok(Suit::Diamonds),
        2 => Ok(Suit::Hearts),
        3 => Ok(Suit::Spades),
        other => Err(EntityError::InvalidSuit(other)),
    }
}

impl From<Card> for WireCard {
    fn from(card: Card) -> Self {
        Self {
            suit: suit_code(card.suit),
            face: card.rank.number() - 1,
        }
    }
}

impl TryFrom<WireCard> for Card {
    type Error = EntityError;

    fn try_from(wire: WireCard) -> std::result::Result<Self, Self::Error> {
        let suit = suit_from_code(wire.suit)?;
        let rank = wire
            .face
            .checked_add(1)
            .ok_or(EntityError::InvalidRank(wire.face))
            .and_then(Rank::try_from)?;
        Ok(Card::new(rank, suit))
    }
}

/// A pile wrapped the way the server wraps stock and waste: `{"Cards": [...]}`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct WireDeck {
    #[serde(rename = "Cards", deserialize_with = "null_as_empty")]
    pub cards: Vec<WireCard>,
}

/// Empty piles arrive as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<WireCard>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<WireCard>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PileRepr {
    Bare(Vec<WireCard>),
    Wrapped(WireDeck),
}

/// Foundation and tableau lists accept bare card arrays, wrapped decks, or
/// `null` for any empty pile.
fn nullable_piles<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<WireCard>>, D::Error>
where
    D: Deserializer<'de>,
{
    let piles = Option::<Vec<Option<PileRepr>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(piles
        .into_iter()
        .map(|pile| match pile {
            Some(PileRepr::Bare(cards)) => cards,
            Some(PileRepr::Wrapped(deck)) => deck.cards,
            None => Vec::new(),
        })
        .collect())
}

/// The game state exactly as the server sends it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireGameState {
    pub stock: WireDeck,
    pub waste: WireDeck,
    #[serde(deserialize_with = "nullable_piles")]
    pub foundations: Vec<Vec<WireCard>>,
    #[serde(deserialize_with = "nullable_piles")]
    pub tableaus: Vec<Vec<WireCard>>,
    pub score: i64,
    #[serde(rename = "GameStateID")]
    pub game_state_id: String,
}

fn convert_pile(cards: Vec<WireCard>) -> std::result::Result<Pile, EntityError> {
    cards.into_iter().map(Card::try_from).collect()
}

fn convert_piles(piles: Vec<Vec<WireCard>>) -> std::result::Result<Vec<Pile>, EntityError> {
    piles.into_iter().map(convert_pile).collect()
}

impl TryFrom<WireGameState> for GameState {
    type Error = EntityError;

    fn try_from(wire: WireGameState) -> std::result::Result<Self, Self::Error> {
        Ok(GameState {
            stock: convert_pile(wire.stock.cards)?,
            waste: convert_pile(wire.waste.cards)?,
            foundations: convert_piles(wire.foundations)?,
            tableaus: convert_piles(wire.tableaus)?,
            score: wire.score,
            game_state_id: SessionId::new(&wire.game_state_id)?,
        })
    }
}

impl From<&GameState> for WireGameState {
    fn from(state: &GameState) -> Self {
        let wire_pile = |pile: &Pile| pile.iter().copied().map(WireCard::from).collect();
        Self {
            stock: WireDeck {
                cards: wire_pile(&state.stock),
            },
            waste: WireDeck {
                cards: wire_pile(&state.waste),
            },
            foundations: state.foundations.iter().map(wire_pile).collect(),
            tableaus: state.tableaus.iter().map(wire_pile).collect(),
            score: state.score,
            game_state_id: state.game_state_id.to_string(),
        }
    }
}

/// Decode and convert a response body in one step.
///
/// # Errors
///
/// Fails on undecodable JSON, missing fields, out-of-range cards, or an empty
/// session id. Nothing is partially decoded.
pub fn decode_game_state(body: &[u8]) -> Result<GameState> {
    let wire: WireGameState = serde_json::from_slice(body)?;
    let state = GameState::try_from(wire)?;
    log::debug!(
        "decoded game state {} with {} cards",
        state.game_state_id,
        state.total_cards()
    );
    Ok(state)
}

/// Body of a `/move` request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MovePayload {
    pub from_pile: PileKind,
    pub from_index: usize,
    pub to_pile: PileKind,
    pub to_index: usize,
}

impl From<MoveRequest> for MovePayload {
    fn from(request: MoveRequest) -> Self {
        Self {
            from_pile: request.from.kind,
            from_index: request.from.index,
            to_pile: request.to.kind,
            to_index: request.to.index,
        }
    }
}

impl From<MovePayload> for MoveRequest {
    fn from(payload: MovePayload) -> Self {
        Self {
            from: PileRef::new(payload.from_pile, payload.from_index),
            to: PileRef::new(payload.to_pile, payload.to_index),
        }
    }
}

/// Body the server sends alongside a non-2xx status.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::errors::WireError;

    const SERVER_STATE: &str = r#"{
        "Stock": {"Cards": [{"Suit": 0, "Face": 11}, {"Suit": 3, "Face": 7}]},
        "Waste": {"Cards": null},
        "Foundations": [[{"Suit": 2, "Face": 0}], null, {"Cards": null}, []],
        "Tableaus": [[{"Suit": 1, "Face": 12}], {"Cards": [{"Suit": 0, "Face": 4}]}],
        "Score": 4,
        "GameStateID": "7f6c1f0e"
    }"#;

    // === Card conversion ===

    #[test]
    fn test_wire_card_faces_are_zero_based() {
        let ace = Card::try_from(WireCard { suit: 2, face: 0 }).unwrap();
        assert_eq!(ace, Card::new(Rank::Ace, Suit::Hearts));
        let king = Card::try_from(WireCard { suit: 3, face: 12 }).unwrap();
        assert_eq!(king, Card::new(Rank::King, Suit::Spades));
    }

    #[test]
    fn test_wire_card_out_of_range() {
        assert_eq!(
            Card::try_from(WireCard { suit: 4, face: 0 }),
            Err(EntityError::InvalidSuit(4))
        );
        assert_eq!(
            Card::try_from(WireCard { suit: 0, face: 13 }),
            Err(EntityError::InvalidRank(14))
        );
        assert_eq!(
            Card::try_from(WireCard { suit: 0, face: 255 }),
            Err(EntityError::InvalidRank(255))
        );
    }

    #[test]
    fn test_wire_card_from_card() {
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                let card = Card::new(rank, suit);
                assert_eq!(Card::try_from(WireCard::from(card)), Ok(card));
            }
        }
    }

    // === GameState decoding ===

    #[test]
    fn test_decode_server_state() {
        let state = decode_game_state(SERVER_STATE.as_bytes()).unwrap();
        assert_eq!(state.stock.len(), 2);
        assert!(state.waste.is_empty());
        assert_eq!(state.foundations.len(), 4);
        assert_eq!(state.foundations[0], vec![Card::new(Rank::Ace, Suit::Hearts)]);
        assert!(state.foundations[1].is_empty());
        assert!(state.foundations[2].is_empty());
        assert_eq!(state.tableaus[1], vec![Card::new(Rank::Five, Suit::Clubs)]);
        assert_eq!(state.score, 4);
        assert_eq!(state.game_state_id.as_str(), "7f6c1f0e");
        assert_eq!(state.total_cards(), 5);
    }

    #[test]
    fn test_decode_missing_field_fails() {
        let body = r#"{"Stock": {"Cards": []}, "Waste": {"Cards": []},
            "Foundations": [], "Tableaus": [], "GameStateID": "x"}"#;
        let result = decode_game_state(body.as_bytes());
        assert!(matches!(result, Err(WireError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_cards_key_fails() {
        let body = r#"{"Stock": {}, "Waste": {"Cards": []},
            "Foundations": [], "Tableaus": [], "Score": 0, "GameStateID": "x"}"#;
        assert!(matches!(
            decode_game_state(body.as_bytes()),
            Err(WireError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_empty_session_fails() {
        let body = r#"{"Stock": {"Cards": []}, "Waste": {"Cards": []},
            "Foundations": [], "Tableaus": [], "Score": 0, "GameStateID": ""}"#;
        assert!(matches!(
            decode_game_state(body.as_bytes()),
            Err(WireError::Invalid(EntityError::EmptySessionId))
        ));
    }

    #[test]
    fn test_decode_bad_card_fails() {
        let body = r#"{"Stock": {"Cards": [{"Suit": 9, "Face": 0}]}, "Waste": {"Cards": []},
            "Foundations": [], "Tableaus": [], "Score": 0, "GameStateID": "x"}"#;
        assert!(matches!(
            decode_game_state(body.as_bytes()),
            Err(WireError::Invalid(EntityError::InvalidSuit(9)))
        ));
    }

    #[test]
    fn test_encode_uses_bare_piles() {
        let state = decode_game_state(SERVER_STATE.as_bytes()).unwrap();
        let value = serde_json::to_value(WireGameState::from(&state)).unwrap();
        assert_eq!(value["Foundations"][0][0]["Face"], 0);
        assert!(value["Foundations"][1].as_array().unwrap().is_empty());
        assert!(value["Waste"]["Cards"].as_array().unwrap().is_empty());
        assert_eq!(value["GameStateID"], "7f6c1f0e");
    }

    // === Requests ===

    #[test]
    fn test_move_payload_shape() {
        let payload = MovePayload::from(MoveRequest {
            from: PileRef::tableau(0),
            to: PileRef::foundation(1),
        });
        let value = serde_json::to_value(payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"FromPile": "tableau", "FromIndex": 0, "ToPile": "foundation", "ToIndex": 1})
        );
    }

    #[test]
    fn test_endpoint_routes() {
        assert_eq!(Endpoint::State.method(), Method::Get);
        assert_eq!(Endpoint::Move.method(), Method::Post);
        assert_eq!(Endpoint::UndoMove.path(), "/undomove");
        assert_eq!(Endpoint::FoundationCard.to_string(), "/foundationcard");
    }

    #[test]
    fn test_error_body() {
        let body: ErrorBody = serde_json::from_str(r#"{"Error": "invalid move"}"#).unwrap();
        assert_eq!(body.error, "invalid move");
    }
}
