//! Call session controller
//!
//! Owns the call state, the provider handle, and the extraction hand-off. Provider events are
//! handled synchronously, one at a time; the only asynchronous work is the extraction task
//! spawned when a call ends, which never blocks event handling.

use crate::error::{VoiceError, VoiceResult};
use crate::event::ProviderEvent;
use crate::handoff::{CallOutcome, ExtractionHandoff, HandoffResult};
use crate::provider::VoiceProvider;
use crate::session::{CallState, CallSummary, SessionSnapshot, Transition};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_ASSISTANT_ID: &str = "triage-assistant";
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(90);

/// Configuration for the call controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Assistant the provider should connect the caller to
    pub assistant_id: String,

    /// Upper bound on one hand-off, end to end (default: 90s)
    pub extraction_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by `TRIAGE_ASSISTANT_ID` and `TRIAGE_EXTRACTION_TIMEOUT_SECS`.
    pub fn from_env() -> VoiceResult<Self> {
        let mut config = Self::default();
        if let Some(id) = env_opt("TRIAGE_ASSISTANT_ID") {
            config.assistant_id = id;
        }
        if let Some(secs) = env_opt("TRIAGE_EXTRACTION_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                VoiceError::Config(format!("TRIAGE_EXTRACTION_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config.extraction_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drives one call at a time and hands each finished call to extraction.
pub struct CallController {
    config: ControllerConfig,
    state: CallState,
    provider: Option<Box<dyn VoiceProvider>>,
    handoff: Arc<dyn ExtractionHandoff>,
    outcome_tx: mpsc::UnboundedSender<CallOutcome>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    in_flight: Vec<JoinHandle<()>>,
}

impl CallController {
    /// Create a controller. Every finished call produces exactly one [`CallOutcome`] on the
    /// returned receiver.
    pub fn new(
        config: ControllerConfig,
        handoff: Arc<dyn ExtractionHandoff>,
    ) -> (Self, mpsc::UnboundedReceiver<CallOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        info!(assistant_id = %config.assistant_id, "📞 Call controller created");

        let controller = Self {
            config,
            state: CallState::default(),
            provider: None,
            handoff,
            outcome_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            in_flight: Vec::new(),
        };
        (controller, outcome_rx)
    }

    pub fn attach_provider(&mut self, provider: Box<dyn VoiceProvider>) {
        info!(provider = provider.name(), "Voice provider attached");
        self.provider = Some(provider);
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&self.state)
    }

    /// Number of extraction tasks that have not finished yet.
    pub fn pending_extractions(&mut self) -> usize {
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.len()
    }

    /// Apply one provider event. Must be called inside a Tokio runtime: a call-end spawns
    /// the extraction task and returns without waiting for it.
    pub fn handle_event(&mut self, event: ProviderEvent) -> Transition {
        let transition = self.state.apply(&event, Instant::now());
        match &transition {
            Transition::Started { call_id } => {
                info!(%call_id, "🟢 Call started");
            }
            Transition::SpeakingChanged(speaking) => {
                debug!(speaking, "Assistant speaking changed");
            }
            Transition::EntryAppended { index } => {
                debug!(index, "Transcript entry appended");
            }
            Transition::Ended(summary) => {
                info!(
                    call_id = %summary.call_id,
                    entries = summary.entries,
                    elapsed_secs = ?summary.elapsed_time,
                    "🔴 Call ended, handing off for extraction"
                );
                self.spawn_extraction(summary.clone());
            }
            Transition::ProviderError(message) => {
                warn!("Voice provider error: {}", message);
            }
            Transition::Ignored(reason) => {
                debug!(event = event.name(), ?reason, "Event ignored in current state");
            }
        }
        transition
    }

    fn spawn_extraction(&mut self, summary: CallSummary) {
        let handoff = Arc::clone(&self.handoff);
        let outcome_tx = self.outcome_tx.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let timeout = self.config.extraction_timeout;

        let handle = tokio::spawn(async move {
            let request = summary.to_request();
            let result = if *shutdown.borrow_and_update() {
                HandoffResult::Cancelled
            } else {
                tokio::select! {
                    res = tokio::time::timeout(timeout, handoff.extract(&request)) => match res {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => {
                            error!(call_id = %summary.call_id, "Extraction hand-off failed: {}", e);
                            HandoffResult::Failed { error: e.to_string() }
                        }
                        Err(_) => {
                            error!(call_id = %summary.call_id, "Extraction timed out after {:?}", timeout);
                            HandoffResult::Failed {
                                error: format!("extraction timed out after {:?}", timeout),
                            }
                        }
                    },
                    // Fires on dispose, shutdown, or drop of the controller.
                    _ = shutdown.changed() => {
                        info!(call_id = %summary.call_id, "Extraction cancelled by teardown");
                        HandoffResult::Cancelled
                    }
                }
            };

            if let HandoffResult::ParseFailure { error, .. } = &result {
                warn!(call_id = %summary.call_id, "Extraction returned unparseable output: {}", error);
            }

            let outcome = CallOutcome {
                call_id: summary.call_id,
                elapsed_time: summary.elapsed_time,
                result,
            };
            if outcome_tx.send(outcome).is_err() {
                debug!("Outcome receiver dropped");
            }
        });

        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(handle);
    }

    /// Ask the provider to start a call. No-op (`Ok(false)`) while connected or without a
    /// provider.
    pub async fn start_call(&mut self) -> VoiceResult<bool> {
        if self.state.is_connected() {
            debug!("start_call ignored: already connected");
            return Ok(false);
        }
        let Some(provider) = self.provider.as_ref() else {
            debug!("start_call ignored: no provider attached");
            return Ok(false);
        };
        provider.start(&self.config.assistant_id).await?;
        Ok(true)
    }

    /// Ask the provider to end the call. No-op (`Ok(false)`) while idle or without a provider.
    pub async fn end_call(&mut self) -> VoiceResult<bool> {
        if !self.state.is_connected() {
            debug!("end_call ignored: not connected");
            return Ok(false);
        }
        let Some(provider) = self.provider.as_ref() else {
            debug!("end_call ignored: no provider attached");
            return Ok(false);
        };
        provider.stop().await?;
        Ok(true)
    }

    /// Process events until the channel closes or the controller is shut down, then dispose.
    ///
    /// An attached provider built on the same sender (such as [`ScriptedProvider`]) keeps
    /// the channel open, so such a loop only ends through [`ShutdownHandle::trigger`].
    ///
    /// [`ScriptedProvider`]: crate::provider::ScriptedProvider
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<ProviderEvent>) -> VoiceResult<()> {
        let mut shutdown = self.shutdown_tx.subscribe();
        if *shutdown.borrow_and_update() {
            return self.dispose().await;
        }
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        self.dispose().await
    }

    /// Handle for stopping [`CallController::run`] from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Tear down: stop an open call with the provider, release the provider, cancel in-flight
    /// extractions, and wait for their outcomes to be delivered.
    ///
    /// A call that is open at teardown is discarded, not handed off.
    pub async fn dispose(&mut self) -> VoiceResult<()> {
        info!("🛑 Disposing call controller");

        let mut stop_result = Ok(());
        if let Some(provider) = self.provider.take() {
            if self.state.is_connected() {
                if let Err(e) = provider.stop().await {
                    error!("Failed to stop call with provider: {}", e);
                    stop_result = Err(e);
                }
            }
        }
        if let Some(session) = self.state.session() {
            warn!(
                call_id = %session.id(),
                entries = session.transcript().len(),
                "Open call discarded at teardown"
            );
        }
        self.state = CallState::Idle;

        self.shutdown_tx.send_replace(true);
        for handle in self.in_flight.drain(..) {
            if let Err(e) = handle.await {
                error!("Extraction task panicked: {}", e);
            }
        }

        info!("✅ Call controller disposed");
        stop_result
    }
}

/// Stops a running controller. Triggering also cancels in-flight extractions.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        if self.state.is_connected() {
            warn!("⚠️ Call controller dropped with a call still connected; call dispose() first");
        }
        // Shutdown handles share the sender, so closing it is not enough.
        self.shutdown_tx.send_replace(true);
    }
}
