//! Post-call hand-off to the extraction pipeline
//!
//! The controller hands every finished call to an [`ExtractionHandoff`] on a spawned task and
//! reports the result as a [`CallOutcome`]. Parse failures stay distinguishable from
//! transport failures all the way to the outcome.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{
    ClinicalRecord, ExtractionError, ExtractionFailure, ExtractionPipeline, ExtractionReply,
    ExtractionRequest,
};
use uuid::Uuid;

/// What became of one finished call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum HandoffResult {
    Record(ClinicalRecord),
    /// Model answered but its text was not a record; `raw` is the fence-stripped text.
    ParseFailure { error: String, raw: String },
    /// Transport, credential, or timeout failure.
    Failed { error: String },
    /// The controller was torn down before the extraction finished.
    Cancelled,
}

impl HandoffResult {
    pub fn record(&self) -> Option<&ClinicalRecord> {
        match self {
            HandoffResult::Record(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    pub call_id: Uuid,
    pub elapsed_time: Option<f64>,
    pub result: HandoffResult,
}

/// Delivers a finished call to extraction. `Ok` is either a record or a parse failure;
/// `Err` is a transport failure.
#[async_trait]
pub trait ExtractionHandoff: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> VoiceResult<HandoffResult>;
}

/// Runs the pipeline in-process.
pub struct PipelineHandoff {
    pipeline: Arc<ExtractionPipeline>,
}

impl PipelineHandoff {
    pub fn new(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ExtractionHandoff for PipelineHandoff {
    async fn extract(&self, request: &ExtractionRequest) -> VoiceResult<HandoffResult> {
        match self.pipeline.extract(request).await {
            Ok(conformed) => Ok(HandoffResult::Record(conformed.record)),
            Err(ExtractionError::Parse { error, raw }) => Ok(HandoffResult::ParseFailure { error, raw }),
            Err(e) => Err(VoiceError::Handoff(e.to_string())),
        }
    }
}

/// Posts the finished call to the extraction endpoint.
pub struct HttpExtractionClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpExtractionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ExtractionHandoff for HttpExtractionClient {
    async fn extract(&self, request: &ExtractionRequest) -> VoiceResult<HandoffResult> {
        let res = self.client.post(&self.endpoint).json(request).send().await?;
        let status = res.status();
        let body = res.text().await?;
        decode_reply(status.as_u16(), &body)
    }
}

/// 200 carries `{result}`, 500 with `{error, raw}` is a parse failure, anything else failed.
fn decode_reply(status: u16, body: &str) -> VoiceResult<HandoffResult> {
    match status {
        200 => {
            let reply: ExtractionReply = serde_json::from_str(body)?;
            Ok(HandoffResult::Record(reply.result))
        }
        500 => match serde_json::from_str::<ExtractionFailure>(body) {
            Ok(failure) => Ok(HandoffResult::ParseFailure {
                error: failure.error,
                raw: failure.raw,
            }),
            Err(_) => Err(VoiceError::Handoff(format!("extraction endpoint returned 500: {}", body))),
        },
        other => Err(VoiceError::Handoff(format!(
            "extraction endpoint returned {}: {}",
            other, body
        ))),
    }
}
