//! Remote language model used by the extraction pipeline.
//!
//! The pipeline only needs "one prompt in, one text reply out", so the seam is the small
//! [`LanguageModel`] trait. [`AnthropicModel`] talks to the Messages API with `reqwest`;
//! tests substitute their own implementation.
//!
//! API key: `ANTHROPIC_API_KEY` (or `TRIAGE_API_KEY`) in `.env`. A missing key does not fail
//! construction; it fails the call with [`ModelError::MissingCredential`].

use crate::config::{api_key_from_env, TriageConfig};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One-shot text completion. Implementations make exactly one round trip per call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` as a single user turn. `Ok(None)` means the reply carried no text.
    async fn complete(&self, prompt: &str) -> Result<Option<String>, ModelError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client.
pub struct AnthropicModel {
    api_key: Option<String>,
    api_base: String,
    version: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicModel {
    /// Build from config; the key comes from the environment.
    pub fn from_config(config: &TriageConfig) -> Self {
        Self::new(api_key_from_env(), config)
    }

    pub fn new(api_key: Option<String>, config: &TriageConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.model_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            version: config.anthropic_version.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingCredential)?;

        let url = format!("{}/v1/messages", self.api_base);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "sending extraction prompt");

        let res = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(ModelError::Unauthorized {
                    status: status.as_u16(),
                    body,
                });
            }
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = res.text().await?;
        reply_text(&text)
    }
}

/// First content block's text, trimmed; blank counts as absent.
fn reply_text(envelope: &str) -> Result<Option<String>, ModelError> {
    let parsed: MessagesResponse =
        serde_json::from_str(envelope).map_err(|e| ModelError::Envelope(e.to_string()))?;
    Ok(parsed
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}
