use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::ModelConfig;
use crate::stream::StreamEvent;
use ensemble_core::{ChatMessage, EnsembleResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Structured-output constraint for a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Schema name sent to the provider.
    pub name: String,
    /// JSON schema the reply must satisfy.
    pub schema: serde_json::Value,
}

impl ResponseFormat {
    /// Strict JSON schema output.
    pub fn json_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// The `response_format` request field.
    pub fn to_request_value(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "schema": self.schema,
            }
        })
    }
}

/// LLM client that dispatches to a provider backend.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    /// Client over the OpenAI-compatible backend.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            backend: Box::new(OpenAiBackend::new(config)),
        }
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Non-streaming chat completion.
    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        response_format: Option<&ResponseFormat>,
    ) -> EnsembleResult<String> {
        self.backend
            .chat(system_prompt, messages, response_format)
            .await
    }

    /// Streaming chat completion.
    ///
    /// Returns an `mpsc::Receiver<StreamEvent>` that yields events as the LLM
    /// generates its response, plus a handle resolving to the full text.
    pub async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        tokio::task::JoinHandle<EnsembleResult<String>>,
    )> {
        self.backend.chat_stream(system_prompt, messages).await
    }
}
