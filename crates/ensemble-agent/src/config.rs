use serde::{Deserialize, Serialize};

/// Chat completion providers reachable through the OpenAI-compatible backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// api.openai.com with bearer auth.
    OpenAi,
    /// OpenRouter; bearer auth plus an `X-Title` header.
    OpenRouter,
    /// Groq cloud inference; OpenAI-compatible API.
    Groq,
    /// AI DIAL: deployment-scoped URLs, `Api-Key` header and an `api-version` query.
    Dial,
}

/// Which model to call and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Wire dialect and default endpoint.
    pub provider: LlmProvider,
    /// Model name, or the deployment name on DIAL.
    pub model_id: String,
    /// Empty means "fill from the environment".
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default base URL.
    pub api_base_url: Option<String>,
    /// DIAL `api-version` query value.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

pub(crate) fn default_api_version() -> String {
    "2025-01-01-preview".to_string()
}

pub(crate) fn default_temperature() -> f32 {
    0.2
}

pub(crate) fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// Configured base URL without a trailing slash, or the provider default.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Dial => "http://localhost:8080",
            }
        }
    }

    /// Full chat completions URL for this provider and model.
    pub fn completions_url(&self) -> String {
        match self.provider {
            LlmProvider::Dial => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url(),
                self.model_id,
                self.api_version
            ),
            _ => format!("{}/v1/chat/completions", self.base_url()),
        }
    }
}
