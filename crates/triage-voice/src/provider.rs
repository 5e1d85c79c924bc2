//! Voice provider seam
//!
//! The live provider connection is external. The controller only needs to ask it to start
//! and stop a call; everything else arrives as [`ProviderEvent`]s on a channel.

use crate::error::{VoiceError, VoiceResult};
use crate::event::ProviderEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Handle to a voice provider connection.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Ask the provider to start a call with the configured assistant.
    async fn start(&self, assistant_id: &str) -> VoiceResult<()>;

    /// Ask the provider to end the current call.
    async fn stop(&self) -> VoiceResult<()>;

    fn name(&self) -> &str {
        "voice-provider"
    }
}

/// How many times a [`ScriptedProvider`] was asked to start or stop.
#[derive(Debug, Clone, Default)]
pub struct ProviderCalls {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl ProviderCalls {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// In-process provider: `start` emits call-start and `stop` emits call-end on the event
/// channel, the way a live provider acknowledges commands.
pub struct ScriptedProvider {
    events: mpsc::UnboundedSender<ProviderEvent>,
    calls: ProviderCalls,
}

impl ScriptedProvider {
    pub fn new(events: mpsc::UnboundedSender<ProviderEvent>) -> Self {
        Self {
            events,
            calls: ProviderCalls::default(),
        }
    }

    pub fn calls(&self) -> ProviderCalls {
        self.calls.clone()
    }

    fn emit(&self, event: ProviderEvent) -> VoiceResult<()> {
        self.events
            .send(event)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }
}

#[async_trait]
impl VoiceProvider for ScriptedProvider {
    async fn start(&self, assistant_id: &str) -> VoiceResult<()> {
        debug!(assistant_id, "scripted provider starting call");
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        self.emit(ProviderEvent::CallStart)
    }

    async fn stop(&self) -> VoiceResult<()> {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        self.emit(ProviderEvent::CallEnd)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_emits_lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let provider = ScriptedProvider::new(tx);
        let calls = provider.calls();

        provider.start("assistant-1").await.unwrap();
        provider.stop().await.unwrap();

        assert_eq!(rx.recv().await, Some(ProviderEvent::CallStart));
        assert_eq!(rx.recv().await, Some(ProviderEvent::CallEnd));
        assert_eq!(calls.starts(), 1);
        assert_eq!(calls.stops(), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let provider = ScriptedProvider::new(tx);
        assert!(matches!(
            provider.start("a").await,
            Err(VoiceError::ChannelSend(_))
        ));
    }
}
