use std::io;
use thiserror::Error;

/// Result type for hot reload operations
pub type HotReloadResult<T> = Result<T, HotReloadError>;

/// Error type for hot reload operations
#[derive(Debug, Error)]
pub enum HotReloadError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Browser refresh error: {0}")]
    Browser(String),

    #[error("Compilation error: {0}")]
    Compilation(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl HotReloadError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        HotReloadError::Config(msg.into())
    }

    /// Create a new channel error
    pub fn channel<S: Into<String>>(msg: S) -> Self {
        HotReloadError::Channel(msg.into())
    }

    /// Create a new compilation error
    pub fn compilation<S: Into<String>>(msg: S) -> Self {
        HotReloadError::Compilation(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        HotReloadError::Other(msg.into())
    }
}

impl From<io::Error> for HotReloadError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HotReloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for HotReloadError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HotReloadError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
