//! Error types for the call session controller

use thiserror::Error;

/// Result type alias for controller operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while driving a call or handing it off
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Extraction hand-off error: {0}")]
    Handoff(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event decode error: {0}")]
    EventDecode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
