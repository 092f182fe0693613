//! OpenAI-style chat completion wire types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ensemble_core::{ChatMessage, EnsembleError, TurnState};
use serde::Deserialize;
use serde_json::{json, Value};

/// `POST /v1/chat/completions` body.
///
/// Earlier assistant messages are expected to carry the state returned on
/// them, in `custom_content.state`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Echoed back in the response; defaults to `ensemble`.
    #[serde(default)]
    pub model: Option<String>,
    /// Full conversation, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Answer as `text/event-stream` chunks.
    #[serde(default)]
    pub stream: bool,
}

/// Identity shared by every object of one completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// `chatcmpl-…` id.
    pub id: String,
    /// Unix seconds.
    pub created: i64,
    /// Model name reported to the client.
    pub model: String,
}

impl Completion {
    /// Fresh id, stamped now.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
        }
    }

    /// Full non-streamed response.
    pub fn response(&self, message: &ChatMessage) -> Value {
        json!({
            "id": self.id,
            "object": "chat.completion",
            "created": self.created,
            "model": self.model,
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": "stop",
            }],
        })
    }

    /// Streamed chunk carrying a content delta.
    pub fn content_chunk(&self, text: &str, first: bool) -> Value {
        let delta = if first {
            json!({"role": "assistant", "content": text})
        } else {
            json!({"content": text})
        };
        self.chunk(delta, Value::Null)
    }

    /// Closing chunk: carries the state to persist and the finish reason.
    pub fn final_chunk(&self, state: &TurnState) -> Value {
        self.chunk(
            json!({"custom_content": {"state": state.to_value()}}),
            json!("stop"),
        )
    }

    fn chunk(&self, delta: Value, finish_reason: Value) -> Value {
        json!({
            "id": self.id,
            "object": "chat.completion.chunk",
            "created": self.created,
            "model": self.model,
            "choices": [{
                "index": 0,
                "delta": delta,
                "finish_reason": finish_reason,
            }],
        })
    }
}

/// An error in OpenAI's `{"error": {"message", "type"}}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// Error with an explicit status and OpenAI error `type`.
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// 400 `invalid_request_error`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", message)
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// JSON body of the response.
    pub fn body(&self) -> Value {
        json!({"error": {"message": self.message, "type": self.kind}})
    }
}

impl From<EnsembleError> for ApiError {
    fn from(err: EnsembleError) -> Self {
        match err {
            EnsembleError::InvalidRequest(msg) => Self::bad_request(msg),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                other.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ChatCompletionRequest =
            serde_json::from_str(r#"{"messages": [{"role": "user", "content": "hi"}]}"#).unwrap();
        assert!(!req.stream);
        assert!(req.model.is_none());
        assert_eq!(req.messages[0].content, "hi");
    }

    #[test]
    fn test_error_mapping() {
        let bad: ApiError = EnsembleError::InvalidRequest("no user message".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.body()["error"]["type"], "invalid_request_error");

        let internal: ApiError = EnsembleError::Decomposition("bad json".into()).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(internal.body()["error"]["message"]
            .as_str()
            .unwrap()
            .contains("bad json"));
    }

    #[test]
    fn test_chunks() {
        let completion = Completion::new("ensemble");
        let first = completion.content_chunk("He", true);
        assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
        assert!(first["choices"][0]["finish_reason"].is_null());

        let state = TurnState {
            ums_conversation_id: Some("abc".into()),
            gpa_messages: None,
        };
        let last = completion.final_chunk(&state);
        assert_eq!(
            last["choices"][0]["delta"]["custom_content"]["state"]["ums_conversation_id"],
            "abc"
        );
        assert_eq!(last["choices"][0]["finish_reason"], "stop");
        assert_eq!(last["id"], first["id"]);
    }
}
