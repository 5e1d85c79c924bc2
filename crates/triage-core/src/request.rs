//! Wire types for the extraction endpoint.

use crate::record::ClinicalRecord;
use serde::{Deserialize, Serialize};

/// One finished call, ready for extraction. Built once per call and consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Newline-joined "Speaker: text" lines.
    pub transcript: String,
    /// Call length in seconds; `null` when the start time was never recorded.
    #[serde(rename = "elapsedTime", default)]
    pub elapsed_time: Option<f64>,
}

impl ExtractionRequest {
    pub fn new(transcript: impl Into<String>, elapsed_time: Option<f64>) -> Self {
        Self {
            transcript: transcript.into(),
            elapsed_time,
        }
    }
}

/// 200 body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReply {
    pub result: ClinicalRecord,
}

/// 500 body for unparseable model output. `raw` is the fence-stripped text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub error: String,
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_names() {
        let req: ExtractionRequest =
            serde_json::from_str(r#"{"transcript":"Patient: hi","elapsedTime":12.5}"#).unwrap();
        assert_eq!(req.elapsed_time, Some(12.5));

        let req: ExtractionRequest =
            serde_json::from_str(r#"{"transcript":"","elapsedTime":null}"#).unwrap();
        assert_eq!(req.elapsed_time, None);

        let json = serde_json::to_value(ExtractionRequest::new("x", None)).unwrap();
        assert_eq!(json, serde_json::json!({"transcript": "x", "elapsedTime": null}));
    }
}
