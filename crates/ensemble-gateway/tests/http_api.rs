#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ensemble_agent::backends::LlmBackend;
use ensemble_agent::{
    AgentGateway, GatewayRequest, GatewayResponse, LlmClient, ResponseFormat, StateUpdate,
    StreamEvent,
};
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult};
use ensemble_gateway::{ApiKeys, GatewayServer};
use ensemble_orchestrator::{AgentName, GatewayRegistry, Orchestrator, OrchestratorConfig};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// One UMS subtask, then stop; answers "Hello there".
struct TwoRoundLlm {
    replies: Mutex<VecDeque<String>>,
}

impl TwoRoundLlm {
    fn new() -> Self {
        let replies = [
            json!({"subtasks": [
                {"task_id": 1, "agent_name": "UMS", "task_description": "list users"}
            ], "stop": false}),
            json!({"subtasks": [], "stop": true}),
        ];
        Self {
            replies: Mutex::new(replies.iter().map(Value::to_string).collect()),
        }
    }
}

#[async_trait]
impl LlmBackend for TwoRoundLlm {
    async fn chat(
        &self,
        _system_prompt: Option<&str>,
        _messages: &[ChatMessage],
        _response_format: Option<&ResponseFormat>,
    ) -> EnsembleResult<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EnsembleError::Agent("no more replies".into()))
    }

    async fn chat_stream(
        &self,
        _system_prompt: Option<&str>,
        _messages: &[ChatMessage],
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        tokio::task::JoinHandle<EnsembleResult<String>>,
    )> {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move {
            for text in ["Hello", " there"] {
                let _ = tx
                    .send(StreamEvent::TextDelta {
                        text: text.to_string(),
                    })
                    .await;
            }
            let _ = tx.send(StreamEvent::Done).await;
            Ok("Hello there".to_string())
        });
        Ok((rx, handle))
    }
}

struct SessionAgent;

#[async_trait]
impl AgentGateway for SessionAgent {
    fn name(&self) -> &str {
        "UMS"
    }

    async fn execute(&self, request: GatewayRequest<'_>) -> EnsembleResult<GatewayResponse> {
        let id = request
            .state
            .ums_conversation_id
            .clone()
            .unwrap_or_else(|| "conv-1".to_string());
        Ok(GatewayResponse {
            content: "alice, bob".into(),
            update: StateUpdate::SessionId(id),
        })
    }
}

fn app(keys: ApiKeys) -> Router {
    let orchestrator = Orchestrator::new(
        Arc::new(LlmClient::from_backend(Box::new(TwoRoundLlm::new()))),
        GatewayRegistry::new().with(AgentName::Ums, Arc::new(SessionAgent)),
        OrchestratorConfig::default(),
    )
    .unwrap();
    GatewayServer::build_with_auth(Arc::new(orchestrator), keys)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app(ApiKeys::default())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ensemble");
    assert_eq!(body["agents"], json!(["UMS"]));
}

#[tokio::test]
async fn test_completion_returns_answer_and_state() {
    let response = app(ApiKeys::default())
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "who are the users?"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["object"], "chat.completion");
    let message = &body["choices"][0]["message"];
    assert_eq!(message["role"], "assistant");
    assert_eq!(message["content"], "Hello there");
    assert_eq!(
        message["custom_content"]["state"]["ums_conversation_id"],
        "conv-1"
    );
}

#[tokio::test]
async fn test_completion_reuses_persisted_session() {
    let response = app(ApiKeys::default())
        .oneshot(chat_request(json!({
            "messages": [
                {"role": "user", "content": "create alice"},
                {"role": "assistant", "content": "done",
                 "custom_content": {"state": {"ums_conversation_id": "abc"}}},
                {"role": "user", "content": "who are the users?"}
            ]
        })))
        .await
        .unwrap();

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        body["choices"][0]["message"]["custom_content"]["state"]["ums_conversation_id"],
        "abc"
    );
}

#[tokio::test]
async fn test_streamed_completion() {
    let response = app(ApiKeys::default())
        .oneshot(chat_request(json!({
            "stream": true,
            "messages": [{"role": "user", "content": "who are the users?"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = body_text(response).await;
    let payloads: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .collect();
    assert_eq!(payloads.last(), Some(&"[DONE]"));

    let chunks: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    let streamed: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(streamed, "Hello there");
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");

    let closing = chunks.last().unwrap();
    assert_eq!(closing["choices"][0]["finish_reason"], "stop");
    assert_eq!(
        closing["choices"][0]["delta"]["custom_content"]["state"]["ums_conversation_id"],
        "conv-1"
    );
}

#[tokio::test]
async fn test_missing_user_message_is_bad_request() {
    let response = app(ApiKeys::default())
        .oneshot(chat_request(json!({
            "messages": [{"role": "assistant", "content": "hi"}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let response = app(ApiKeys::default())
        .oneshot(chat_request(json!({"prompt": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_required_when_keys_configured() {
    let keys = ApiKeys::new(vec!["secret".to_string()]);

    let denied = app(keys.clone())
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(denied.headers()["www-authenticate"], "Bearer");
    let body: Value = serde_json::from_str(&body_text(denied).await).unwrap();
    assert_eq!(body["error"]["type"], "authentication_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Missing API key"));

    let mut request = chat_request(json!({
        "messages": [{"role": "user", "content": "hi"}]
    }));
    request
        .headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let allowed = app(keys.clone()).oneshot(request).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    let health = app(keys)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_api_key_is_rejected() {
    let mut request = chat_request(json!({
        "messages": [{"role": "user", "content": "hi"}]
    }));
    request
        .headers_mut()
        .insert("authorization", "Bearer guess".parse().unwrap());

    let response = app(ApiKeys::new(vec!["secret".to_string()]))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["type"], "authentication_error");
    assert_eq!(body["error"]["message"], "Incorrect API key provided");
}

#[tokio::test]
async fn test_blank_keys_leave_routes_open() {
    let response = app(ApiKeys::new(vec!["  ".to_string()]))
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
