//! Error types for the pagewatch system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for pagewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the pagewatch system
#[derive(Error, Debug)]
pub enum Error {
    /// The page could not be observed at all this run (transport or HTTP failure)
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// Unexpected headless browser fault
    #[error("Render error: {0}")]
    Render(String),

    /// State store-related errors (fatal to a run)
    #[error("State store error: {0}")]
    StateStore(String),

    /// Notification delivery errors
    #[error("Notify error: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors (target files)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

impl Error {
    /// Create an acquisition (hard fetch failure) error
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    /// Create a render error
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a notify error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Whether this error means the persisted state cannot be trusted or committed
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StateStore(_))
    }
}
