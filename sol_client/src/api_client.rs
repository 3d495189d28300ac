//! HTTP transport to the game server.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use solitaire::{
    GameState, WireError,
    messages::{self, ErrorBody, Method, MovePayload},
};
use std::time::Duration;
use thiserror::Error;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Server rejected request ({status}): {message}")]
    Server { status: StatusCode, message: String },

    /// The server answered 2xx with a body that isn't a game state
    #[error("Malformed game state: {0}")]
    Malformed(#[from] WireError),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// JSON body of a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    /// `{}`
    Empty {},
    Move(MovePayload),
}

/// Sends one request and returns the game state the server answered with.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
    ) -> TransportResult<GameState>;
}

/// [`Transport`] over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend can't be initialized.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Pull a human-readable message out of an error response body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(ErrorBody { error }) = serde_json::from_slice::<ErrorBody>(body) {
        return error;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
    ) -> TransportResult<GameState> {
        tracing::debug!(?method, %url, "Sending request");
        let mut request = match method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = error_message(status, &bytes);
            tracing::warn!(%status, %url, %message, "Server rejected request");
            return Err(TransportError::Server { status, message });
        }

        Ok(messages::decode_game_state(&bytes)?)
    }
}
