//! Symptom classifier client.
//!
//! The classifier is a separately hosted service (`POST /classify`) that maps a free-text
//! symptom summary to a triage level. This module only formats the extracted symptoms into
//! that summary and decodes the verdict.

use crate::record::{Symptom, UNKNOWN};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How symptoms are flattened into the classifier's input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymptomFormat {
    /// `symptom (severity, duration, location): description`, joined by "; ".
    Detailed,
    /// Descriptions only (symptom name when empty), joined by ". ".
    Simple,
    /// Symptom with known qualifiers only, joined by ". ".
    #[default]
    Balanced,
    /// Symptom names, joined by ", ".
    Minimal,
}

impl FromStr for SymptomFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(SymptomFormat::Detailed),
            "simple" => Ok(SymptomFormat::Simple),
            "balanced" => Ok(SymptomFormat::Balanced),
            "minimal" => Ok(SymptomFormat::Minimal),
            other => Err(format!("unknown symptom format: {}", other)),
        }
    }
}

fn is_known(value: &str) -> bool {
    !value.is_empty() && value != UNKNOWN
}

fn balanced(s: &Symptom) -> String {
    let mut out = s.symptom.clone();
    if is_known(&s.severity) {
        out.push_str(&format!(" ({})", s.severity));
    }
    if is_known(&s.location) {
        out.push_str(&format!(" in {}", s.location));
    }
    if is_known(&s.duration) {
        out.push_str(&format!(" for {}", s.duration));
    }
    if !s.description.is_empty() && s.description != s.symptom {
        out.push_str(&format!(" - {}", s.description));
    }
    out
}

pub fn format_symptoms(symptoms: &[Symptom], format: SymptomFormat) -> String {
    match format {
        SymptomFormat::Detailed => symptoms
            .iter()
            .map(|s| {
                format!(
                    "{} ({}, {}, {}): {}",
                    s.symptom, s.severity, s.duration, s.location, s.description
                )
            })
            .collect::<Vec<_>>()
            .join("; "),
        SymptomFormat::Simple => symptoms
            .iter()
            .map(|s| {
                if s.description.is_empty() {
                    s.symptom.as_str()
                } else {
                    s.description.as_str()
                }
            })
            .collect::<Vec<_>>()
            .join(". "),
        SymptomFormat::Balanced => symptoms.iter().map(balanced).collect::<Vec<_>>().join(". "),
        SymptomFormat::Minimal => symptoms
            .iter()
            .map(|s| s.symptom.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    symptoms: &'a str,
}

/// Classifier verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageClassification {
    pub label: String,
    pub confidence: f64,
    pub all_scores: HashMap<String, f64>,
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("classifier error {status}: {body}")]
    Status { status: u16, body: String },
}

pub struct ClassifierClient {
    base_url: String,
    client: reqwest::Client,
}

impl ClassifierClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn classify(&self, symptoms: &str) -> Result<TriageClassification, ClassifierError> {
        let url = format!("{}/classify", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&ClassifyRequest { symptoms })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json().await?)
    }
}
