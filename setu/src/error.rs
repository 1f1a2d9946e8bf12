//! Error types for Setu

use thiserror::Error;

/// Setu error type
#[derive(Error, Debug)]
pub enum SetuError {
    #[error("No discovery broadcast received before timeout")]
    DiscoveryTimeout,

    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("Session is not open")]
    NotOpen,

    #[error("Session is already open")]
    AlreadyOpen,

    #[error("Session is closed; create a new session to reconnect")]
    SessionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out waiting for acknowledgement")]
    AckTimeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Video error: {0}")]
    Video(String),
}

impl From<toml::de::Error> for SetuError {
    fn from(e: toml::de::Error) -> Self {
        SetuError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SetuError>;
