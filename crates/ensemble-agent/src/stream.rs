use serde::{Deserialize, Serialize};

/// Events emitted during a streaming LLM response.
///
/// These let consumers (the HTTP gateway, the CLI) show text as it arrives
/// from the provider instead of waiting for the full answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of text content from the assistant.
    TextDelta { text: String },

    /// The stream has finished successfully.
    Done,

    /// An error occurred during streaming.
    Error { message: String },
}
