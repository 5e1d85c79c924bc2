//! Replay CLI: drive the call controller from a recorded event log.
//!
//! Usage:
//!   cargo run -p triage-voice --bin triage-replay -- --events call.jsonl [--endpoint URL]
//!       [--in-process] [--classify URL] [--format balanced|detailed|simple|minimal]
//!
//! Each line of the events file is one provider event, e.g.
//! `{"event":"message","type":"transcript","role":"user","transcript":"my chest hurts"}`.
//! The scripted provider opens the call, the recorded events are applied in order, and the
//! call is closed if the log did not close it. Outcomes are printed as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::{
    format_symptoms, ClassifierClient, ExtractionPipeline, SymptomFormat, TriageConfig,
};
use triage_voice::{
    CallController, ControllerConfig, ExtractionHandoff, HandoffResult, HttpExtractionClient,
    PipelineHandoff, ProviderEvent, ScriptedProvider, Transition, VoiceError,
};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/extract";
const CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let mut events_path: Option<PathBuf> = None;
    let mut endpoint = DEFAULT_ENDPOINT.to_string();
    let mut in_process = false;
    let mut classify_url: Option<String> = None;
    let mut format = SymptomFormat::default();

    while let Some(a) = args.next() {
        match a.as_str() {
            "--events" => events_path = args.next().map(PathBuf::from),
            "--endpoint" => {
                if let Some(e) = args.next() {
                    endpoint = e;
                }
            }
            "--in-process" => in_process = true,
            "--classify" => classify_url = args.next(),
            "--format" => {
                if let Some(f) = args.next() {
                    format = f.parse()?;
                }
            }
            other => warn!("Ignoring unknown argument: {}", other),
        }
    }

    let Some(events_path) = events_path else {
        eprintln!("triage-replay: replay a recorded call through the triage controller");
        eprintln!("  --events FILE       JSON-lines provider events (required)");
        eprintln!("  --endpoint URL      Extraction endpoint (default {})", DEFAULT_ENDPOINT);
        eprintln!("  --in-process        Run the extraction pipeline locally instead");
        eprintln!("  --classify URL      Classifier base URL (or TRIAGE_CLASSIFIER_URL)");
        eprintln!("  --format NAME       balanced | detailed | simple | minimal");
        return Ok(());
    };

    let events = read_events(&events_path)?;
    info!("Loaded {} events from {}", events.len(), events_path.display());

    let triage_config = TriageConfig::load()?;
    let controller_config = ControllerConfig::from_env()?;

    let handoff: Arc<dyn ExtractionHandoff> = if in_process {
        info!(model = %triage_config.model, "Extracting in-process");
        Arc::new(PipelineHandoff::new(Arc::new(ExtractionPipeline::from_config(
            &triage_config,
        ))))
    } else {
        info!(%endpoint, "Extracting via endpoint");
        Arc::new(HttpExtractionClient::new(
            endpoint,
            controller_config.extraction_timeout,
        )?)
    };

    let (mut controller, mut outcomes) = CallController::new(controller_config, handoff);
    let (provider_tx, mut provider_rx) = mpsc::unbounded_channel();
    controller.attach_provider(Box::new(ScriptedProvider::new(provider_tx)));

    let mut finished = 0usize;
    controller.start_call().await?;
    finished += pump(&mut controller, &mut provider_rx);
    for event in events {
        if let Transition::Ended(_) = controller.handle_event(event) {
            finished += 1;
        }
    }
    if controller.end_call().await? {
        finished += pump(&mut controller, &mut provider_rx);
    }

    let classify_url = classify_url.or_else(|| triage_config.classifier_url.clone());
    let classifier = classify_url.map(|url| ClassifierClient::new(url, CLASSIFIER_TIMEOUT));

    for _ in 0..finished {
        let Some(outcome) = outcomes.recv().await else {
            break;
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);

        if let (Some(classifier), HandoffResult::Record(record)) = (&classifier, &outcome.result) {
            let summary = format_symptoms(&record.extracted_symptoms, format);
            match classifier.classify(&summary).await {
                Ok(verdict) => println!("{}", serde_json::to_string_pretty(&verdict)?),
                Err(e) => warn!("Classifier unavailable: {}", e),
            }
        }
    }

    controller.dispose().await?;
    Ok(())
}

/// Apply whatever the scripted provider has emitted so far. Returns finished calls.
fn pump(controller: &mut CallController, rx: &mut mpsc::UnboundedReceiver<ProviderEvent>) -> usize {
    let mut finished = 0;
    while let Ok(event) = rx.try_recv() {
        if let Transition::Ended(_) = controller.handle_event(event) {
            finished += 1;
        }
    }
    finished
}

fn read_events(path: &Path) -> Result<Vec<ProviderEvent>, VoiceError> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| VoiceError::Config(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}
