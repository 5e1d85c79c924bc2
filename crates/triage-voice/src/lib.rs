//! # Triage Voice - Call Session Controller
//!
//! Turns asynchronous voice provider events into a per-call transcript and, when the call
//! ends, hands `(transcript, elapsedTime)` to the extraction pipeline without blocking.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Call Controller                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │   Provider   │ → │  CallState   │ → │ Extraction task  │  │
//! │  │    events    │   │  (session)   │   │ (timeout/cancel) │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘  │
//! │         ↑                                       ↓             │
//! │  start / stop                             CallOutcome         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod controller;
pub mod error;
pub mod event;
pub mod handoff;
pub mod provider;
pub mod session;
pub mod transcript;

pub use controller::{CallController, ControllerConfig, ShutdownHandle};
pub use error::{VoiceError, VoiceResult};
pub use event::{ProviderEvent, ProviderMessage};
pub use handoff::{CallOutcome, ExtractionHandoff, HandoffResult, HttpExtractionClient, PipelineHandoff};
pub use provider::{ProviderCalls, ScriptedProvider, VoiceProvider};
pub use session::{CallState, CallSummary, ConnectionState, IgnoreReason, SessionSnapshot, Transition};
pub use transcript::{Speaker, Transcript, TranscriptEntry};
