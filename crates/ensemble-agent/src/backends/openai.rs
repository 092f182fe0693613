use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::llm::ResponseFormat;
use crate::sse::{is_done, SseDecoder};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult, Role};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, AI DIAL and any other provider that
/// implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Backend with its own HTTP client.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Model and endpoint settings.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn build_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Vec<serde_json::Value> {
        let mut api_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        api_messages.extend(
            messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(ChatMessage::to_wire),
        );

        api_messages
    }

    /// A POST to the completions endpoint with provider auth headers applied.
    pub(crate) fn completions_request(&self) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(self.config.completions_url())
            .header("Content-Type", "application/json");

        match self.config.provider {
            LlmProvider::Dial => request.header("Api-Key", &self.config.api_key),
            LlmProvider::OpenRouter => request
                .bearer_auth(&self.config.api_key)
                .header("X-Title", "Ensemble"),
            LlmProvider::OpenAi | LlmProvider::Groq => request.bearer_auth(&self.config.api_key),
        }
    }

    fn base_body(&self, api_messages: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": api_messages,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        response_format: Option<&ResponseFormat>,
    ) -> EnsembleResult<String> {
        let mut body = self.base_body(self.build_messages(system_prompt, messages));
        if let Some(format) = response_format {
            body["response_format"] = format.to_request_value();
        }

        let resp = self
            .completions_request()
            .json(&body)
            .send()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EnsembleError::Http(format!(
                "Chat completions error {status}: {error_body}"
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        parse_openai_response(&resp_body)
    }

    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EnsembleResult<(mpsc::Receiver<StreamEvent>, JoinHandle<EnsembleResult<String>>)> {
        let mut body = self.base_body(self.build_messages(system_prompt, messages));
        body["stream"] = serde_json::json!(true);

        let resp = self
            .completions_request()
            .json(&body)
            .send()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EnsembleError::Http(format!(
                "Chat completions error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut full_text = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let message = format!("Stream read error: {e}");
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: message.clone(),
                            })
                            .await;
                        return Err(EnsembleError::Http(message));
                    }
                };

                for payload in decoder.push(&chunk) {
                    if is_done(&payload) {
                        let _ = tx.send(StreamEvent::Done).await;
                        return Ok(full_text);
                    }
                    if let Some(text) = payload_delta(&payload) {
                        full_text.push_str(&text);
                        let _ = tx.send(StreamEvent::TextDelta { text }).await;
                    }
                }
            }

            // Some servers close the connection without a final newline or [DONE].
            if let Some(text) = decoder
                .finish()
                .filter(|payload| !is_done(payload))
                .and_then(|payload| payload_delta(&payload))
            {
                full_text.push_str(&text);
                let _ = tx.send(StreamEvent::TextDelta { text }).await;
            }
            let _ = tx.send(StreamEvent::Done).await;
            Ok(full_text)
        });

        Ok((rx, handle))
    }
}

/// The non-empty `choices[0].delta.content` of a streamed chunk.
pub fn delta_content(event: &serde_json::Value) -> Option<&str> {
    event["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
}

/// Delta text of one streamed payload. Malformed chunks yield nothing.
pub(crate) fn payload_delta(payload: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(event) => delta_content(&event).map(str::to_string),
        Err(_) => {
            debug!(payload = %payload, "Skipping malformed stream chunk");
            None
        }
    }
}

/// The `choices[0].message.content` of a non-streamed completion.
pub fn parse_openai_response(body: &serde_json::Value) -> EnsembleResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EnsembleError::Http(format!("Response has no message content: {body}")))
}
