use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Feed too large ({size} bytes, limit {limit}) for URL: {url}")]
    FeedTooLarge { size: usize, limit: usize, url: String },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid time between requests {input:?}: {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error("time between requests must be at least {}s, got {}s", .minimum.as_secs(), .interval.as_secs_f64())]
    IntervalTooShort { interval: Duration, minimum: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Post already exists: {0}")]
    PostConflict(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Feed already registered: {0}")]
    FeedExists(String),

    #[error("Not logged in: run `gator login <name>` first")]
    NotLoggedIn,

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Errors that must stop startup before any tick runs
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::InvalidInterval { .. } | Error::IntervalTooShort { .. } | Error::Toml(_)
        )
    }

    /// Whether the store rejected a post because its URL is already known
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::PostConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
