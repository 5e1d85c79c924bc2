//! Triage configuration loaded from `config/triage.toml` and `TRIAGE_*` environment variables.
//!
//! | Key / Env | Default | Description |
//! |-----------|---------|-------------|
//! | host / TRIAGE_HOST | 127.0.0.1 | Gateway bind address. |
//! | port / TRIAGE_PORT | 8000 | Gateway port. |
//! | model / TRIAGE_MODEL | claude-opus-4-20250514 | Remote model used for extraction. |
//! | api_base / TRIAGE_API_BASE | https://api.anthropic.com | Messages API base URL. |
//! | model_timeout_secs / TRIAGE_MODEL_TIMEOUT_SECS | 60 | Upper bound for one model round trip. |
//! | allowed_origins / TRIAGE_ALLOWED_ORIGINS | http://localhost:3000 | Comma-separated UI origins for CORS. |
//! | classifier_url / TRIAGE_CLASSIFIER_URL | unset | Base URL of the symptom classifier service. |
//!
//! The model credential is never part of the file: see [`api_key_from_env`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/triage";
pub const DEFAULT_MODEL: &str = "claude-opus-4-20250514";
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    pub host: String,
    pub port: u16,
    /// Model identifier sent in every extraction request.
    pub model: String,
    pub api_base: String,
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub model_timeout_secs: u64,
    /// Comma-separated list; see [`TriageConfig::origins`].
    pub allowed_origins: String,
    #[serde(default)]
    pub classifier_url: Option<String>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            max_tokens: 1024,
            temperature: 0.3,
            model_timeout_secs: 60,
            allowed_origins: "http://localhost:3000".to_string(),
            classifier_url: None,
        }
    }
}

impl TriageConfig {
    /// Load config from file and environment. Precedence: env > `TRIAGE_CONFIG` path (or
    /// `config/triage.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("TRIAGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Some(Path::new(&config_path)))
    }

    /// Same as [`TriageConfig::load`] with an explicit file. A missing file is not an error.
    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("model", defaults.model)?
            .set_default("api_base", defaults.api_base)?
            .set_default("anthropic_version", defaults.anthropic_version)?
            .set_default("max_tokens", i64::from(defaults.max_tokens))?
            .set_default("temperature", f64::from(defaults.temperature))?
            .set_default("model_timeout_secs", defaults.model_timeout_secs as i64)?
            .set_default("allowed_origins", defaults.allowed_origins)?;

        let builder = match path {
            Some(p) => builder.add_source(config::File::from(p).required(false)),
            None => builder,
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        built.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs.max(1))
    }

    /// Allowed CORS origins, trimmed, empties dropped.
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Model credential: `ANTHROPIC_API_KEY`, falling back to `TRIAGE_API_KEY`. Blank values count as unset.
pub fn api_key_from_env() -> Option<String> {
    env_opt_string("ANTHROPIC_API_KEY").or_else(|| env_opt_string("TRIAGE_API_KEY"))
}

pub(crate) fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
