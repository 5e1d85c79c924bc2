//! Call lifecycle state machine
//!
//! One transition function consumes provider events in delivery order. A fresh
//! [`CallSession`] (new id, empty transcript) is created on every call-start and consumed
//! on call-end, so nothing leaks between calls.

use crate::event::{ProviderEvent, TRANSCRIPT_KIND};
use crate::transcript::{Speaker, Transcript, TranscriptEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use triage_core::ExtractionRequest;
use uuid::Uuid;

/// Connection state as shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Connected,
}

/// One voice interaction.
#[derive(Debug)]
pub struct CallSession {
    id: Uuid,
    started_at: Option<Instant>,
    started_wall: DateTime<Utc>,
    assistant_speaking: bool,
    transcript: Transcript,
}

impl CallSession {
    fn start(now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Some(now),
            started_wall: Utc::now(),
            assistant_speaking: false,
            transcript: Transcript::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_wall(&self) -> DateTime<Utc> {
        self.started_wall
    }

    pub fn assistant_speaking(&self) -> bool {
        self.assistant_speaking
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Close out the session. The start instant is consumed here and nowhere else.
    fn finish(&mut self, now: Instant) -> CallSummary {
        // Millisecond resolution, never negative.
        let elapsed_time = self
            .started_at
            .take()
            .map(|start| now.saturating_duration_since(start).as_millis() as f64 / 1000.0);
        self.assistant_speaking = false;

        let transcript = std::mem::take(&mut self.transcript);
        CallSummary {
            call_id: self.id,
            started_at: self.started_wall,
            transcript: transcript.render(),
            entries: transcript.len(),
            elapsed_time,
        }
    }
}

/// Everything the hand-off needs about a finished call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSummary {
    pub call_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Rendered transcript
    pub transcript: String,
    pub entries: usize,
    /// Seconds between call-start and call-end
    pub elapsed_time: Option<f64>,
}

impl CallSummary {
    pub fn to_request(&self) -> ExtractionRequest {
        ExtractionRequest::new(self.transcript.clone(), self.elapsed_time)
    }
}

/// Why an event had no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotConnected,
    AlreadyConnected,
    NonTranscriptMessage(String),
    EmptyTranscript,
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Started { call_id: Uuid },
    SpeakingChanged(bool),
    EntryAppended { index: usize },
    Ended(CallSummary),
    ProviderError(String),
    Ignored(IgnoreReason),
}

#[derive(Debug, Default)]
pub enum CallState {
    #[default]
    Idle,
    Connected(CallSession),
}

impl CallState {
    pub fn connection_state(&self) -> ConnectionState {
        match self {
            CallState::Idle => ConnectionState::Idle,
            CallState::Connected(_) => ConnectionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, CallState::Connected(_))
    }

    /// Always false while idle.
    pub fn assistant_speaking(&self) -> bool {
        self.session().map(|s| s.assistant_speaking).unwrap_or(false)
    }

    pub fn session(&self) -> Option<&CallSession> {
        match self {
            CallState::Idle => None,
            CallState::Connected(session) => Some(session),
        }
    }

    /// Apply one provider event. Errors never change state; out-of-order events are
    /// reported as [`Transition::Ignored`].
    pub fn apply(&mut self, event: &ProviderEvent, now: Instant) -> Transition {
        match self {
            CallState::Idle => match event {
                ProviderEvent::CallStart => {
                    let session = CallSession::start(now);
                    let call_id = session.id;
                    *self = CallState::Connected(session);
                    Transition::Started { call_id }
                }
                ProviderEvent::Error { message } => Transition::ProviderError(message.clone()),
                _ => Transition::Ignored(IgnoreReason::NotConnected),
            },
            CallState::Connected(session) => match event {
                ProviderEvent::CallStart => Transition::Ignored(IgnoreReason::AlreadyConnected),
                ProviderEvent::SpeechStart => {
                    session.assistant_speaking = true;
                    Transition::SpeakingChanged(true)
                }
                ProviderEvent::SpeechEnd => {
                    session.assistant_speaking = false;
                    Transition::SpeakingChanged(false)
                }
                ProviderEvent::Message(msg) if msg.kind != TRANSCRIPT_KIND => {
                    Transition::Ignored(IgnoreReason::NonTranscriptMessage(msg.kind.clone()))
                }
                ProviderEvent::Message(msg) => match msg.transcript.as_deref() {
                    Some(text) if !text.trim().is_empty() => {
                        session
                            .transcript
                            .push(Speaker::from_provider_role(&msg.role), text);
                        Transition::EntryAppended {
                            index: session.transcript.len() - 1,
                        }
                    }
                    _ => Transition::Ignored(IgnoreReason::EmptyTranscript),
                },
                ProviderEvent::CallEnd => {
                    let summary = session.finish(now);
                    *self = CallState::Idle;
                    Transition::Ended(summary)
                }
                ProviderEvent::Error { message } => Transition::ProviderError(message.clone()),
            },
        }
    }
}

/// Read model for re-rendering the call UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub call_id: Option<Uuid>,
    pub connection_state: ConnectionState,
    pub assistant_speaking: bool,
    pub transcript: Vec<TranscriptEntry>,
}

impl From<&CallState> for SessionSnapshot {
    fn from(state: &CallState) -> Self {
        Self {
            call_id: state.session().map(|s| s.id),
            connection_state: state.connection_state(),
            assistant_speaking: state.assistant_speaking(),
            transcript: state
                .session()
                .map(|s| s.transcript.entries().to_vec())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn drive(state: &mut CallState, events: &[ProviderEvent], start: Instant) -> Vec<Transition> {
        events
            .iter()
            .enumerate()
            .map(|(i, e)| state.apply(e, start + Duration::from_secs(i as u64)))
            .collect()
    }

    #[test]
    fn test_full_call_flow() {
        let mut state = CallState::default();
        let t0 = Instant::now();

        assert!(matches!(state.apply(&ProviderEvent::CallStart, t0), Transition::Started { .. }));
        state.apply(&ProviderEvent::transcript("user", "my chest hurts"), t0);
        state.apply(&ProviderEvent::SpeechStart, t0);
        assert!(state.assistant_speaking());
        state.apply(&ProviderEvent::transcript("assistant", "how long?"), t0);
        state.apply(&ProviderEvent::SpeechEnd, t0);
        state.apply(&ProviderEvent::transcript("user", "two hours"), t0);

        let end = t0 + Duration::from_millis(125_500);
        match state.apply(&ProviderEvent::CallEnd, end) {
            Transition::Ended(summary) => {
                assert_eq!(
                    summary.transcript,
                    "Patient: my chest hurts\nAssistant: how long?\nPatient: two hours"
                );
                assert_eq!(summary.entries, 3);
                assert_eq!(summary.elapsed_time, Some(125.5));
                assert_eq!(summary.to_request().elapsed_time, Some(125.5));
            }
            other => panic!("expected Ended, got {:?}", other),
        }
        assert_eq!(state.connection_state(), ConnectionState::Idle);
        assert!(!state.assistant_speaking());
    }

    #[test]
    fn test_new_call_starts_empty() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        drive(
            &mut state,
            &[
                ProviderEvent::CallStart,
                ProviderEvent::transcript("user", "first call"),
                ProviderEvent::CallEnd,
            ],
            t0,
        );
        let first_id = SessionSnapshot::from(&state).call_id;
        assert_eq!(first_id, None);

        state.apply(&ProviderEvent::CallStart, t0);
        let snap = SessionSnapshot::from(&state);
        assert!(snap.transcript.is_empty());
        assert!(snap.call_id.is_some());
    }

    #[test]
    fn test_each_call_gets_new_id() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        let first = match state.apply(&ProviderEvent::CallStart, t0) {
            Transition::Started { call_id } => call_id,
            other => panic!("{:?}", other),
        };
        state.apply(&ProviderEvent::CallEnd, t0);
        let second = match state.apply(&ProviderEvent::CallStart, t0) {
            Transition::Started { call_id } => call_id,
            other => panic!("{:?}", other),
        };
        assert_ne!(first, second);
    }

    #[test]
    fn test_idle_ignores_everything_but_start() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        let results = drive(
            &mut state,
            &[
                ProviderEvent::CallEnd,
                ProviderEvent::SpeechStart,
                ProviderEvent::transcript("user", "hello?"),
            ],
            t0,
        );
        for r in results {
            assert_eq!(r, Transition::Ignored(IgnoreReason::NotConnected));
        }
        assert!(!state.assistant_speaking());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_second_start_is_ignored() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        state.apply(&ProviderEvent::CallStart, t0);
        state.apply(&ProviderEvent::transcript("user", "kept"), t0);
        assert_eq!(
            state.apply(&ProviderEvent::CallStart, t0),
            Transition::Ignored(IgnoreReason::AlreadyConnected)
        );
        assert_eq!(SessionSnapshot::from(&state).transcript.len(), 1);
    }

    #[test]
    fn test_speaking_cleared_on_end() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        drive(
            &mut state,
            &[ProviderEvent::CallStart, ProviderEvent::SpeechStart, ProviderEvent::CallEnd],
            t0,
        );
        assert!(!state.assistant_speaking());
    }

    #[test]
    fn test_non_transcript_and_blank_messages_ignored() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        state.apply(&ProviderEvent::CallStart, t0);

        let fc: ProviderEvent = serde_json::from_str(
            r#"{"event":"message","type":"function-call","role":"assistant","transcript":"x"}"#,
        )
        .unwrap();
        assert_eq!(
            state.apply(&fc, t0),
            Transition::Ignored(IgnoreReason::NonTranscriptMessage("function-call".to_string()))
        );
        assert_eq!(
            state.apply(&ProviderEvent::transcript("user", "   "), t0),
            Transition::Ignored(IgnoreReason::EmptyTranscript)
        );
        assert!(SessionSnapshot::from(&state).transcript.is_empty());
    }

    #[test]
    fn test_error_does_not_change_state() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        assert_eq!(
            state.apply(&ProviderEvent::error("boom"), t0),
            Transition::ProviderError("boom".to_string())
        );
        assert!(!state.is_connected());

        state.apply(&ProviderEvent::CallStart, t0);
        state.apply(&ProviderEvent::SpeechStart, t0);
        state.apply(&ProviderEvent::error("boom"), t0);
        assert!(state.is_connected());
        assert!(state.assistant_speaking());
    }

    #[test]
    fn test_elapsed_never_negative() {
        let mut state = CallState::default();
        let t0 = Instant::now();
        state.apply(&ProviderEvent::CallStart, t0 + Duration::from_secs(5));
        // end observed with an earlier clock reading
        match state.apply(&ProviderEvent::CallEnd, t0) {
            Transition::Ended(summary) => assert_eq!(summary.elapsed_time, Some(0.0)),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_idle_never_speaking_for_all_short_sequences() {
        let kinds = [
            ProviderEvent::CallStart,
            ProviderEvent::CallEnd,
            ProviderEvent::SpeechStart,
            ProviderEvent::SpeechEnd,
            ProviderEvent::transcript("user", "hello"),
            ProviderEvent::error("boom"),
        ];
        let t0 = Instant::now();
        let mut checked = 0usize;

        for len in 0..=6u32 {
            for code in 0..kinds.len().pow(len) {
                let mut state = CallState::default();
                let mut rest = code;
                for step in 0..len {
                    let event = &kinds[rest % kinds.len()];
                    rest /= kinds.len();

                    let transition = state.apply(event, t0 + Duration::from_millis(step as u64));
                    if let Transition::Ended(summary) = &transition {
                        assert!(summary.elapsed_time.unwrap() >= 0.0);
                    }
                    if let Transition::Started { .. } = transition {
                        assert!(SessionSnapshot::from(&state).transcript.is_empty());
                    }
                    if !state.is_connected() {
                        assert!(!state.assistant_speaking(), "speaking while idle for code {} len {}", code, len);
                    }
                    checked += 1;
                }
            }
        }
        assert!(checked > 270_000);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut state = CallState::default();
        state.apply(&ProviderEvent::CallStart, Instant::now());
        let json = serde_json::to_value(SessionSnapshot::from(&state)).unwrap();
        assert_eq!(json["connectionState"], "Connected");
        assert_eq!(json["assistantSpeaking"], false);
        assert!(json["callId"].is_string());
    }
}
