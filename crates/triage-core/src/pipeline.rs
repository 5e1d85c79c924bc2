//! Extraction pipeline: prompt -> one model call -> fence-strip -> parse -> schema check.

use crate::config::TriageConfig;
use crate::error::ExtractionError;
use crate::model_service::{AnthropicModel, LanguageModel};
use crate::normalize::normalize_reply;
use crate::prompts::triage_extraction_prompt;
use crate::record::{ClinicalRecord, Conformed};
use crate::request::ExtractionRequest;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct ExtractionPipeline {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ExtractionPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Anthropic-backed pipeline bounded by `model_timeout_secs`.
    pub fn from_config(config: &TriageConfig) -> Self {
        Self::new(
            Arc::new(AnthropicModel::from_config(config)),
            config.model_timeout(),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one extraction. Exactly one model call, no retry. Transport failures and timeouts
    /// propagate; unparseable output comes back as [`ExtractionError::Parse`] with the raw text.
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<Conformed, ExtractionError> {
        let prompt = triage_extraction_prompt(&request.transcript, request.elapsed_time);

        let reply = tokio::time::timeout(self.timeout, self.model.complete(&prompt))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))??;

        if reply.is_none() {
            warn!("model reply carried no text, treating as empty object");
        }
        let normalized = normalize_reply(reply.as_deref());
        let conformed = parse_record(&normalized, request.elapsed_time)?;

        info!(
            symptoms = conformed.record.extracted_symptoms.len(),
            urgency = conformed.record.patient_data.urgency.as_str(),
            repaired = conformed.repaired.len(),
            "extraction complete"
        );
        if !conformed.is_clean() {
            warn!(fields = ?conformed.repaired, "model output repaired with sentinels");
        }
        Ok(conformed)
    }
}

/// Parse already-normalized model text into a record. Only text that is not JSON fails;
/// any JSON value is conformed.
pub fn parse_record(normalized: &str, elapsed_time: Option<f64>) -> Result<Conformed, ExtractionError> {
    let value: Value = serde_json::from_str(normalized).map_err(|e| {
        warn!(raw_len = normalized.len(), "failed to parse model output: {}", e);
        ExtractionError::Parse {
            error: e.to_string(),
            raw: normalized.to_string(),
        }
    })?;
    Ok(ClinicalRecord::conform(&value, elapsed_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NOT_AVAILABLE, ROOT_PATH, UNKNOWN};

    #[test]
    fn test_truncated_json_keeps_raw() {
        let err = parse_record("{\"patientData\":", None).unwrap_err();
        match err {
            ExtractionError::Parse { raw, .. } => assert_eq!(raw, "{\"patientData\":"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_json_is_conformed() {
        for raw in ["[]", "null", "42", "\"ok\""] {
            let conformed = parse_record(raw, Some(5.0)).unwrap();
            assert_eq!(conformed.repaired[0], ROOT_PATH, "for {}", raw);
            assert_eq!(conformed.record.patient_data.name, UNKNOWN);
            assert_eq!(conformed.record.patient_data.duration, Some(5.0));
            assert_eq!(conformed.record.actions, vec![NOT_AVAILABLE.to_string()]);
        }
    }

    #[test]
    fn test_valid_json_parses() {
        let conformed =
            parse_record(r#"{"patientData":{"name":"Jane","age":40}}"#, Some(3.0)).unwrap();
        assert_eq!(conformed.record.patient_data.name, "Jane");
        assert_eq!(conformed.record.patient_data.age, 40);
        assert_eq!(conformed.record.patient_data.duration, Some(3.0));
    }
}
