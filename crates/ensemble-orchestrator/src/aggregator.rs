use crate::driver::{last_user_content, with_last_user_content};
use crate::prompts::aggregation_user_content;
use crate::types::TaskResult;
use ensemble_agent::{LlmClient, StreamEvent};
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Synthesizes the final answer from all task results via a streamed completion.
pub struct Aggregator {
    llm: Arc<LlmClient>,
    system_prompt: String,
    timeout: Duration,
}

impl Aggregator {
    /// `timeout` bounds the whole stream.
    pub fn new(llm: Arc<LlmClient>, system_prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    /// Stream the synthesized answer, forwarding each text delta to `sink`.
    ///
    /// Failing to open the stream, or exceeding the timeout, is fatal. A stream
    /// that breaks part-way returns what had accumulated; one that yields
    /// nothing returns an empty string.
    pub async fn aggregate(
        &self,
        conversation: &[ChatMessage],
        results: &[TaskResult],
        sink: Option<&mpsc::Sender<StreamEvent>>,
    ) -> EnsembleResult<String> {
        let original = last_user_content(conversation).unwrap_or_default();
        let messages =
            with_last_user_content(conversation, aggregation_user_content(results, original));

        tokio::time::timeout(self.timeout, self.stream(&messages, sink))
            .await
            .map_err(|_| EnsembleError::timeout("result aggregation", self.timeout))?
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        sink: Option<&mpsc::Sender<StreamEvent>>,
    ) -> EnsembleResult<String> {
        let (mut rx, handle) = self
            .llm
            .chat_stream(Some(&self.system_prompt), messages)
            .await
            .map_err(|e| EnsembleError::Aggregation(e.to_string()))?;

        let mut content = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    content.push_str(&text);
                    if let Some(sink) = sink {
                        if sink.send(StreamEvent::TextDelta { text }).await.is_err() {
                            debug!("Stream consumer went away, still accumulating");
                        }
                    }
                }
                StreamEvent::Done => break,
                StreamEvent::Error { message } => {
                    warn!(error = %message, "Aggregation stream broke, keeping partial answer");
                    break;
                }
            }
        }
        drop(rx);

        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Aggregation stream ended with error"),
            Err(e) => warn!(error = %e, "Aggregation stream task aborted"),
        }

        Ok(content)
    }
}
