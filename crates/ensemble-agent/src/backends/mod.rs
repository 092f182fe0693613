/// OpenAI-compatible chat completions.
pub mod openai;

use crate::llm::ResponseFormat;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use ensemble_core::{ChatMessage, EnsembleResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trait for LLM provider backends.
///
/// The orchestrator only ever needs two shapes of call: a one-shot completion
/// (optionally constrained to a JSON schema) for decomposition, and a streamed
/// completion for aggregation. Tests substitute their own implementation.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion returning the assistant text.
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        response_format: Option<&ResponseFormat>,
    ) -> EnsembleResult<String>;

    /// Streaming chat completion.
    ///
    /// Returns a receiver for stream events and a join handle that resolves
    /// to the full accumulated text.
    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EnsembleResult<(mpsc::Receiver<StreamEvent>, JoinHandle<EnsembleResult<String>>)>;
}
