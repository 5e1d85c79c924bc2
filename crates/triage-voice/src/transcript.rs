//! Transcript buffer: speaker-attributed utterances in arrival order.

use serde::{Deserialize, Serialize};

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Caller,
    Assistant,
}

impl Speaker {
    /// Provider role "user" is the caller; every other role is the assistant.
    pub fn from_provider_role(role: &str) -> Self {
        if role.trim().eq_ignore_ascii_case("user") {
            Speaker::Caller
        } else {
            Speaker::Assistant
        }
    }

    /// Fixed label used in the rendered transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Caller => "Patient",
            Speaker::Assistant => "Assistant",
        }
    }
}

/// One utterance. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Speaker,
    pub text: String,
}

/// Append-only, order-preserving transcript for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Speaker, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role,
            text: text.into(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newline-joined "Label: text" lines, in arrival order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}", e.role.label(), e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
