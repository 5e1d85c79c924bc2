//! Voice provider events.
//!
//! The provider's callback surface (`call-start`, `call-end`, `speech-start`, `speech-end`,
//! `message`, `error`) becomes one tagged enum so a single transition function can consume it
//! and tests can feed it without a live connection.

use serde::{Deserialize, Serialize};

/// Message kind carrying a transcript line.
pub const TRANSCRIPT_KIND: &str = "transcript";

/// Payload of a `message` event. Only `type == "transcript"` is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// Events emitted by the voice provider, in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProviderEvent {
    CallStart,
    CallEnd,
    /// Assistant started speaking
    SpeechStart,
    /// Assistant stopped speaking
    SpeechEnd,
    Message(ProviderMessage),
    /// Provider-side failure; never changes call state.
    Error { message: String },
}

impl ProviderEvent {
    pub fn transcript(role: &str, text: &str) -> Self {
        ProviderEvent::Message(ProviderMessage {
            kind: TRANSCRIPT_KIND.to_string(),
            role: role.to_string(),
            transcript: Some(text.to_string()),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProviderEvent::Error {
            message: message.into(),
        }
    }

    /// Wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::CallStart => "call-start",
            ProviderEvent::CallEnd => "call-end",
            ProviderEvent::SpeechStart => "speech-start",
            ProviderEvent::SpeechEnd => "speech-end",
            ProviderEvent::Message(_) => "message",
            ProviderEvent::Error { .. } => "error",
        }
    }
}
