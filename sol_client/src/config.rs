//! Client configuration management.
//!
//! Consolidates all environment variable reads. CLI flags override the
//! environment, which overrides the defaults.

use reqwest::Url;
use solitaire::DECK_SIZE;
use std::{path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_SERVER: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the game server API
    pub server: Url,
    /// Address the session is resumed from and mirrored into
    pub location: Url,
    /// File persisting the location between runs
    pub location_file: Option<PathBuf>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Cards every server state must hold; `None` disables the check
    pub deck_size: Option<usize>,
    /// Play locally without a server
    pub offline: bool,
}

/// Values given on the command line. Each one beats its environment variable.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub location: Option<String>,
    pub location_file: Option<PathBuf>,
    pub offline: bool,
}

impl ClientConfig {
    /// Load configuration from environment variables and CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns error if a URL or number is malformed.
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let server = overrides
            .server
            .or_else(|| std::env::var("SOLITAIRE_SERVER").ok())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let server = parse_url("SOLITAIRE_SERVER", &server)?;

        let location = match overrides
            .location
            .or_else(|| std::env::var("SOLITAIRE_LOCATION").ok())
        {
            Some(location) => parse_url("SOLITAIRE_LOCATION", &location)?,
            None => server.clone(),
        };

        let location_file = overrides
            .location_file
            .or_else(|| std::env::var("SOLITAIRE_LOCATION_FILE").ok().map(PathBuf::from));

        let timeout_secs = parse_env_or("SOLITAIRE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SOLITAIRE_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        let deck_size = match parse_env_or("SOLITAIRE_DECK_SIZE", DECK_SIZE)? {
            0 => None,
            n => Some(n),
        };

        Ok(Self {
            server,
            location,
            location_file,
            timeout: Duration::from_secs(timeout_secs),
            deck_size,
            offline: overrides.offline,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL for {var}: {value:?} ({reason})")]
    InvalidUrl {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_url(var: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("{value:?} is not a valid number"),
        }),
        Err(_) => Ok(default),
    }
}
