//! In-process stand-in for the game server.
//!
//! Answers every route with a full game state the way the real server does,
//! but never checks a move: `/move` echoes the current state unchanged. Tests
//! can queue raw replies or delay a route to exercise error and ordering paths.

#![allow(dead_code)]

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use reqwest::Url;
use sol_client::{
    api_client::HttpTransport,
    dispatcher::Dispatcher,
    session::{Location, MemoryLocation, SessionManager},
    store::GameStore,
};
use solitaire::{GameState, SessionId, functional::build_deck, messages::WireGameState};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;

/// A request the stub received.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

struct StubState {
    game: GameState,
    new_game_id: String,
    requests: Vec<Recorded>,
    scripted: VecDeque<(StatusCode, String)>,
    delays: HashMap<String, Duration>,
}

/// A fresh Klondike deal: 28 cards over seven tableaus, 24 in the stock.
pub fn fresh_deal(id: &str) -> GameState {
    let mut cards = build_deck();
    let mut tableaus = Vec::new();
    for i in 0..7 {
        tableaus.push(cards.split_off(cards.len() - (i + 1)));
    }
    GameState {
        stock: cards,
        waste: vec![],
        foundations: vec![vec![]; 4],
        tableaus,
        score: 0,
        game_state_id: SessionId::new(id).unwrap(),
    }
}

pub fn to_json(state: &GameState) -> String {
    serde_json::to_string(&WireGameState::from(state)).unwrap()
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "Error": message }).to_string()
}

impl StubState {
    fn respond(&mut self, path: &str) -> (StatusCode, String) {
        match path {
            "/state" | "/move" | "/foundationcard" => (StatusCode::OK, to_json(&self.game)),
            "/newgame" => {
                self.game = fresh_deal(&self.new_game_id);
                (StatusCode::OK, to_json(&self.game))
            }
            "/flipstock" => {
                if let Some(card) = self.game.stock.pop() {
                    self.game.waste.push(card);
                }
                (StatusCode::OK, to_json(&self.game))
            }
            "/undomove" => (StatusCode::BAD_REQUEST, error_json("Nothing to undo")),
            _ => (StatusCode::NOT_FOUND, error_json("Not found")),
        }
    }
}

#[derive(Clone)]
struct Stub(Arc<Mutex<StubState>>);

async fn handle(State(stub): State<Stub>, method: Method, uri: Uri, body: Bytes) -> Response {
    let (delay, (status, reply)) = {
        let mut state = stub.0.lock().await;
        state.requests.push(Recorded {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
        let delay = state.delays.get(uri.path()).copied();
        let reply = match state.scripted.pop_front() {
            Some(reply) => reply,
            None => state.respond(uri.path()),
        };
        (delay, reply)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    (status, [(CONTENT_TYPE, "application/json")], reply).into_response()
}

pub struct StubServer {
    pub base: Url,
    state: Arc<Mutex<StubState>>,
}

impl StubServer {
    /// Serve a fresh deal with session id `initial` on an ephemeral port.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(StubState {
            game: fresh_deal("initial"),
            new_game_id: "abc123".to_string(),
            requests: Vec::new(),
            scripted: VecDeque::new(),
            delays: HashMap::new(),
        }));
        let app = Router::new()
            .fallback(handle)
            .with_state(Stub(state.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
        }
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.state.lock().await.requests.clone()
    }

    pub async fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .await
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }

    /// Answer the next request with `body` instead of the route's default.
    pub async fn script(&self, status: StatusCode, body: impl Into<String>) {
        self.state
            .lock()
            .await
            .scripted
            .push_back((status, body.into()));
    }

    /// Hold every answer on `path` for `delay`. The state is captured when
    /// the request arrives.
    pub async fn delay(&self, path: &str, delay: Duration) {
        self.state
            .lock()
            .await
            .delays
            .insert(path.to_string(), delay);
    }

    pub async fn game(&self) -> GameState {
        self.state.lock().await.game.clone()
    }
}

/// A dispatcher talking to `server` over HTTP, with its location starting at
/// `location`.
pub async fn connect(server: &StubServer, location: &str) -> (Arc<Dispatcher>, Arc<MemoryLocation>) {
    connect_to(server.base.clone(), location).await
}

pub async fn connect_to(base: Url, location: &str) -> (Arc<Dispatcher>, Arc<MemoryLocation>) {
    let location = Arc::new(MemoryLocation::new(Url::parse(location).unwrap()));
    let dispatcher = connect_with(base, Box::new(location.clone())).await;
    (dispatcher, location)
}

/// A dispatcher talking to `base` over HTTP that keeps its session in
/// `location`.
pub async fn connect_with(base: Url, location: Box<dyn Location>) -> Arc<Dispatcher> {
    let session = SessionManager::from_location(location).await.unwrap();
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    Arc::new(Dispatcher::new(
        Arc::new(GameStore::default()),
        Arc::new(session),
        Arc::new(transport),
        base,
    ))
}
