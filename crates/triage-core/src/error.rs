//! Error types for the extraction pipeline.

use std::time::Duration;
use thiserror::Error;

/// Failures of the single remote-model round trip. None of these are retried.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model credential missing: set ANTHROPIC_API_KEY")]
    MissingCredential,

    #[error("model rejected credential ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response envelope could not be decoded: {0}")]
    Envelope(String),
}

/// Outcome of a failed extraction. `Parse` is the only locally recovered kind: it keeps the
/// normalized model text so the caller can show it instead of losing it.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to parse model output: {error}")]
    Parse { error: String, raw: String },
}

impl ExtractionError {
    pub fn is_parse(&self) -> bool {
        matches!(self, ExtractionError::Parse { .. })
    }

    /// Normalized model text for parse failures.
    pub fn raw(&self) -> Option<&str> {
        match self {
            ExtractionError::Parse { raw, .. } => Some(raw.as_str()),
            _ => None,
        }
    }
}
