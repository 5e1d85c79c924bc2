//! Triage extraction prompt: turn a call transcript into one `ClinicalRecord` JSON object.
//!
//! The field names and nesting here are the contract checked by `record::ClinicalRecord::conform`;
//! change both together.

/// Single user prompt. `{elapsed_time}` is pinned by the caller so the model never guesses the
/// call length; `{transcript}` is the newline-joined "Speaker: text" rendering.
pub const TRIAGE_EXTRACTION_TEMPLATE: &str = r#"You are a medical triage assistant. A transcript of a patient voice call is provided below.

Your task is to analyze it and return a JSON object with exactly the following structure:

{
  "patientData": {
    "name": string,
    "age": number,
    "gender": string,
    "phone": string (or "Unknown"),
    "callDate": string (YYYY-MM-DD),
    "duration": {elapsed_time},
    "urgency": "High" | "Medium" | "Low"
  },
  "extractedSymptoms": [
    {
      "symptom": string,
      "severity": string,
      "duration": string,
      "location": string,
      "description": string
    }
  ],
  "transcript": string,
  "actions": [string],
  "clinicalNotes": {
    "assessment": string,
    "concerns": string,
    "plan": string
  }
}

Rules:
- "transcript" is the cleaned up, readable full transcript.
- "actions" lists actions taken during the call, or ["N/A"] if none.
- Copy "duration" exactly as given above; do not estimate it.
- Use "Unknown" for patient details or symptom fields you cannot determine, and "N/A" for any other missing value. Never omit a key.
- Return only valid JSON with no extra commentary before or after it.

Transcript:
---
{transcript}
---"#;

/// Elapsed seconds as it appears in the prompt: the number, or `null` when unknown.
pub fn render_elapsed_time(elapsed_time: Option<f64>) -> String {
    match elapsed_time {
        Some(secs) if secs.is_finite() => secs.to_string(),
        _ => "null".to_string(),
    }
}

/// Build the extraction prompt. The transcript is substituted last so its contents are never
/// scanned for placeholders.
pub fn triage_extraction_prompt(transcript: &str, elapsed_time: Option<f64>) -> String {
    TRIAGE_EXTRACTION_TEMPLATE
        .replace("{elapsed_time}", &render_elapsed_time(elapsed_time))
        .replace("{transcript}", transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_pins_duration_and_embeds_transcript() {
        let prompt = triage_extraction_prompt("Patient: my chest hurts", Some(125.0));
        assert!(prompt.contains("\"duration\": 125,"));
        assert!(prompt.contains("Patient: my chest hurts"));
        assert!(prompt.contains("\"High\" | \"Medium\" | \"Low\""));
        assert!(!prompt.contains("{transcript}"));
    }

    #[test]
    fn test_prompt_unknown_duration_is_null() {
        let prompt = triage_extraction_prompt("", None);
        assert!(prompt.contains("\"duration\": null,"));
        assert_eq!(render_elapsed_time(Some(f64::NAN)), "null");
        assert_eq!(render_elapsed_time(Some(12.5)), "12.5");
    }

    #[test]
    fn test_transcript_placeholders_are_not_expanded() {
        let prompt = triage_extraction_prompt("Patient: {elapsed_time}", Some(3.0));
        assert!(prompt.contains("Patient: {elapsed_time}"));
    }
}
