//! Session identity.
//!
//! The server issues a `GameStateID` with each state. The client keeps it in
//! memory, mirrors it into the page location's `gameStateID` query parameter
//! so a reload (or a shared link) resumes the same game, and appends it to
//! every outbound request URL.

use async_trait::async_trait;
use reqwest::Url;
use solitaire::{GameState, SessionId, messages::SESSION_QUERY_PARAM};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::store::Ticket;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The location could not be read or written
    #[error("Location I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored location is not a URL
    #[error("Invalid location URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Where the address the user sees lives.
///
/// `replace` must rewrite the address without adding a history entry.
#[async_trait]
pub trait Location: Send + Sync {
    async fn href(&self) -> SessionResult<Url>;

    async fn replace(&self, url: Url) -> SessionResult<()>;
}

#[async_trait]
impl<L: Location + ?Sized> Location for Arc<L> {
    async fn href(&self) -> SessionResult<Url> {
        (**self).href().await
    }

    async fn replace(&self, url: Url) -> SessionResult<()> {
        (**self).replace(url).await
    }
}

/// Location held in memory for the life of the process.
pub struct MemoryLocation {
    url: Mutex<Url>,
}

impl MemoryLocation {
    pub fn new(url: Url) -> Self {
        Self {
            url: Mutex::new(url),
        }
    }
}

#[async_trait]
impl Location for MemoryLocation {
    async fn href(&self) -> SessionResult<Url> {
        Ok(self.url.lock().await.clone())
    }

    async fn replace(&self, url: Url) -> SessionResult<()> {
        *self.url.lock().await = url;
        Ok(())
    }
}

/// Location persisted to a file so a later run can resume the game.
///
/// A missing file reads as `fallback`.
pub struct FileLocation {
    path: PathBuf,
    fallback: Url,
}

impl FileLocation {
    pub fn new(path: impl Into<PathBuf>, fallback: Url) -> Self {
        Self {
            path: path.into(),
            fallback,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl Location for FileLocation {
    async fn href(&self) -> SessionResult<Url> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(self.fallback.clone()),
            Ok(contents) => {
                let value = contents.trim();
                Url::parse(value).map_err(|e| SessionError::InvalidUrl {
                    value: value.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self.fallback.clone()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn replace(&self, url: Url) -> SessionResult<()> {
        tokio::fs::write(&self.path, format!("{url}\n"))
            .await
            .map_err(|e| self.io_error(e))
    }
}

/// Read the session id carried by `url`, if any.
///
/// An empty value counts as absent.
pub fn session_from_url(url: &Url) -> Option<SessionId> {
    url.query_pairs()
        .find(|(key, _)| key == SESSION_QUERY_PARAM)
        .and_then(|(_, value)| SessionId::new(&value).ok())
}

/// Return `url` with its `gameStateID` parameter set to `session`.
///
/// Other parameters keep their order and their exact encoding. Any existing
/// `gameStateID` is replaced rather than duplicated.
pub fn with_session(url: &Url, session: &SessionId) -> Url {
    let kept: Vec<&str> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|segment| {
            let key = segment.split_once('=').map_or(*segment, |(key, _)| key);
            !segment.is_empty() && key != SESSION_QUERY_PARAM
        })
        .collect();

    let mut merged = url.clone();
    if kept.is_empty() {
        merged.set_query(None);
    } else {
        merged.set_query(Some(&kept.join("&")));
    }
    merged
        .query_pairs_mut()
        .append_pair(SESSION_QUERY_PARAM, session.as_str());
    merged
}

/// Bookkeeping for keeping the location in step with adopted sessions.
struct LocationSync {
    /// Ticket of the newest response whose session was adopted.
    adopted: Option<Ticket>,
    /// Whether the location already carries the current session.
    written: bool,
}

/// Tracks the current game session.
pub struct SessionManager {
    current: RwLock<Option<SessionId>>,
    sync: Mutex<LocationSync>,
    location: Box<dyn Location>,
}

impl SessionManager {
    /// Restore the session from the location's query string.
    ///
    /// # Errors
    ///
    /// Returns an error if the location can't be read.
    pub async fn from_location(location: Box<dyn Location>) -> SessionResult<Self> {
        let href = location.href().await?;
        let current = session_from_url(&href);
        match &current {
            Some(session) => tracing::info!(%session, "Resuming session from location"),
            None => tracing::info!("No session in location, starting fresh"),
        }
        Ok(Self {
            current: RwLock::new(current),
            sync: Mutex::new(LocationSync {
                adopted: None,
                written: true,
            }),
            location,
        })
    }

    pub async fn current_session_id(&self) -> Option<SessionId> {
        self.current.read().await.clone()
    }

    /// Adopt the session id from the response to the request holding
    /// `ticket`.
    ///
    /// Adoptions run one at a time, location write included, and a response
    /// older than one already adopted is ignored. The location is rewritten
    /// when the id changes or when an earlier write failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the location can't be updated. The in-memory id is
    /// adopted regardless and the write is retried on the next adoption.
    pub async fn adopt_from_response(&self, ticket: Ticket, state: &GameState) -> SessionResult<()> {
        let incoming = &state.game_state_id;
        let mut sync = self.sync.lock().await;
        if let Some(adopted) = sync.adopted
            && ticket < adopted
        {
            tracing::debug!(
                ticket = ticket.value(),
                adopted = adopted.value(),
                "Ignoring session from superseded response"
            );
            return Ok(());
        }
        sync.adopted = Some(ticket);

        {
            let mut current = self.current.write().await;
            if current.as_ref() != Some(incoming) {
                tracing::info!(session = %incoming, previous = ?*current, "Adopted session");
                *current = Some(incoming.clone());
                sync.written = false;
            }
        }
        if sync.written {
            return Ok(());
        }

        let href = self.location.href().await?;
        self.location.replace(with_session(&href, incoming)).await?;
        sync.written = true;
        Ok(())
    }

    /// Attach the current session to an outbound request URL.
    ///
    /// Without a session the URL is returned unchanged.
    pub async fn attach(&self, url: Url) -> Url {
        match self.current.read().await.as_ref() {
            Some(session) => with_session(&url, session),
            None => url,
        }
    }

    /// The location as the user would bookmark it.
    ///
    /// # Errors
    ///
    /// Returns an error if the location can't be read.
    pub async fn shareable_link(&self) -> SessionResult<Url> {
        self.location.href().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GameStore;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    /// Location whose first `replace` fails.
    struct FlakyLocation {
        inner: MemoryLocation,
        replaces: AtomicUsize,
    }

    #[async_trait]
    impl Location for FlakyLocation {
        async fn href(&self) -> SessionResult<Url> {
            self.inner.href().await
        }

        async fn replace(&self, url: Url) -> SessionResult<()> {
            if self.replaces.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SessionError::Io {
                    path: PathBuf::from("location"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.replace(url).await
        }
    }

    /// Location whose first `href` takes a while to answer.
    struct SlowLocation {
        inner: MemoryLocation,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl Location for SlowLocation {
        async fn href(&self) -> SessionResult<Url> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.href().await
        }

        async fn replace(&self, url: Url) -> SessionResult<()> {
            self.inner.replace(url).await
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn state_with_id(id: &str) -> GameState {
        GameState {
            stock: vec![],
            waste: vec![],
            foundations: vec![vec![]; 4],
            tableaus: vec![vec![]; 7],
            score: 0,
            game_state_id: SessionId::new(id).unwrap(),
        }
    }

    // === Query merging ===

    #[test]
    fn test_with_session_appends_to_bare_url() {
        let merged = with_session(&url("http://host/state"), &SessionId::new("abc").unwrap());
        assert_eq!(merged.as_str(), "http://host/state?gameStateID=abc");
    }

    #[test]
    fn test_with_session_keeps_other_params() {
        let merged = with_session(
            &url("http://host/move?debug=1&theme=dark"),
            &SessionId::new("abc").unwrap(),
        );
        assert_eq!(
            merged.as_str(),
            "http://host/move?debug=1&theme=dark&gameStateID=abc"
        );
    }

    #[test]
    fn test_with_session_replaces_existing_param() {
        let merged = with_session(
            &url("http://host/?gameStateID=old&x=y"),
            &SessionId::new("new").unwrap(),
        );
        assert_eq!(merged.as_str(), "http://host/?x=y&gameStateID=new");
        assert_eq!(merged.query_pairs().filter(|(k, _)| k == "gameStateID").count(), 1);
    }

    #[test]
    fn test_with_session_keeps_raw_encoding() {
        let merged = with_session(
            &url("http://host/?a=b%20c&flag&gameStateID=old&q=x+y#top"),
            &SessionId::new("new").unwrap(),
        );
        assert_eq!(
            merged.as_str(),
            "http://host/?a=b%20c&flag&q=x+y&gameStateID=new#top"
        );
    }

    #[test]
    fn test_session_from_url() {
        assert_eq!(
            session_from_url(&url("http://host/?gameStateID=abc123")).unwrap().as_str(),
            "abc123"
        );
        assert!(session_from_url(&url("http://host/?gameStateID=")).is_none());
        assert!(session_from_url(&url("http://host/?other=1")).is_none());
    }

    // === Manager ===

    #[tokio::test]
    async fn test_restores_session_from_location() {
        let location = MemoryLocation::new(url("http://host/?gameStateID=abc123"));
        let manager = SessionManager::from_location(Box::new(location)).await.unwrap();
        assert_eq!(manager.current_session_id().await.unwrap().as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_attach_without_session_is_noop() {
        let manager = SessionManager::from_location(Box::new(MemoryLocation::new(url("http://host/"))))
            .await
            .unwrap();
        let target = url("http://api/state");
        assert_eq!(manager.attach(target.clone()).await, target);
    }

    #[tokio::test]
    async fn test_adopt_rewrites_location_and_attaches() {
        let shared = Arc::new(MemoryLocation::new(url("http://host/play?theme=dark")));
        let manager = SessionManager::from_location(Box::new(shared.clone()))
            .await
            .unwrap();
        let tickets = GameStore::default();

        manager
            .adopt_from_response(tickets.issue_ticket(), &state_with_id("abc123"))
            .await
            .unwrap();

        assert_eq!(
            shared.href().await.unwrap().as_str(),
            "http://host/play?theme=dark&gameStateID=abc123"
        );
        assert_eq!(
            manager.attach(url("http://api/state")).await.as_str(),
            "http://api/state?gameStateID=abc123"
        );
    }

    #[tokio::test]
    async fn test_adopt_same_id_leaves_location_alone() {
        let shared = Arc::new(MemoryLocation::new(url("http://host/?gameStateID=abc123&b=2")));
        let manager = SessionManager::from_location(Box::new(shared.clone()))
            .await
            .unwrap();
        let tickets = GameStore::default();

        manager
            .adopt_from_response(tickets.issue_ticket(), &state_with_id("abc123"))
            .await
            .unwrap();

        assert_eq!(
            shared.href().await.unwrap().as_str(),
            "http://host/?gameStateID=abc123&b=2"
        );
    }

    #[tokio::test]
    async fn test_adopt_replaces_previous_session() {
        let shared = Arc::new(MemoryLocation::new(url("http://host/?gameStateID=old")));
        let manager = SessionManager::from_location(Box::new(shared.clone()))
            .await
            .unwrap();
        let tickets = GameStore::default();

        manager
            .adopt_from_response(tickets.issue_ticket(), &state_with_id("new"))
            .await
            .unwrap();

        assert_eq!(manager.current_session_id().await.unwrap().as_str(), "new");
        assert_eq!(shared.href().await.unwrap().as_str(), "http://host/?gameStateID=new");
    }

    #[tokio::test]
    async fn test_failed_location_write_is_retried() {
        let shared = Arc::new(FlakyLocation {
            inner: MemoryLocation::new(url("http://host/")),
            replaces: AtomicUsize::new(0),
        });
        let manager = SessionManager::from_location(Box::new(shared.clone()))
            .await
            .unwrap();
        let tickets = GameStore::default();

        let first = manager
            .adopt_from_response(tickets.issue_ticket(), &state_with_id("abc123"))
            .await;
        assert!(matches!(first, Err(SessionError::Io { .. })));
        assert_eq!(manager.current_session_id().await.unwrap().as_str(), "abc123");
        assert_eq!(shared.href().await.unwrap().as_str(), "http://host/");

        manager
            .adopt_from_response(tickets.issue_ticket(), &state_with_id("abc123"))
            .await
            .unwrap();
        assert_eq!(shared.href().await.unwrap().as_str(), "http://host/?gameStateID=abc123");

        manager
            .adopt_from_response(tickets.issue_ticket(), &state_with_id("abc123"))
            .await
            .unwrap();
        assert_eq!(shared.replaces.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_location_write_does_not_overtake_newer_session() {
        let shared = Arc::new(SlowLocation {
            inner: MemoryLocation::new(url("http://host/")),
            reads: AtomicUsize::new(0),
        });
        let manager = Arc::new(
            SessionManager::from_location(Box::new(shared.clone()))
                .await
                .unwrap(),
        );
        let tickets = GameStore::default();
        let (older, newer) = (tickets.issue_ticket(), tickets.issue_ticket());

        let slow = tokio::spawn({
            let manager = manager.clone();
            async move { manager.adopt_from_response(older, &state_with_id("old")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager
            .adopt_from_response(newer, &state_with_id("new"))
            .await
            .unwrap();
        slow.await.unwrap().unwrap();

        assert_eq!(manager.current_session_id().await.unwrap().as_str(), "new");
        assert_eq!(shared.href().await.unwrap().as_str(), "http://host/?gameStateID=new");
    }

    #[tokio::test]
    async fn test_superseded_response_is_not_adopted() {
        let shared = Arc::new(MemoryLocation::new(url("http://host/")));
        let manager = SessionManager::from_location(Box::new(shared.clone()))
            .await
            .unwrap();
        let tickets = GameStore::default();
        let (older, newer) = (tickets.issue_ticket(), tickets.issue_ticket());

        manager
            .adopt_from_response(newer, &state_with_id("new"))
            .await
            .unwrap();
        manager
            .adopt_from_response(older, &state_with_id("old"))
            .await
            .unwrap();

        assert_eq!(manager.current_session_id().await.unwrap().as_str(), "new");
        assert_eq!(shared.href().await.unwrap().as_str(), "http://host/?gameStateID=new");
    }
}
