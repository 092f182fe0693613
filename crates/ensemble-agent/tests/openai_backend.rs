//! OpenAI-compatible backend tests against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ensemble_agent::{LlmClient, LlmProvider, ModelConfig, ResponseFormat, StreamEvent};
use ensemble_core::{ChatMessage, EnsembleError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(provider: LlmProvider, base: String) -> ModelConfig {
    ModelConfig {
        provider,
        model_id: "gpt-4o".to_string(),
        api_key: "secret".to_string(),
        api_base_url: Some(base),
        api_version: "2025-01-01-preview".to_string(),
        temperature: 0.2,
        max_tokens: 256,
    }
}

#[tokio::test]
async fn test_chat_sends_response_format_and_returns_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "plan"},
                {"role": "user", "content": "hi"}
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "task_decomposition"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"subtasks\": []}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, server.uri()));
    let format = ResponseFormat::json_schema("task_decomposition", json!({"type": "object"}));
    let text = client
        .chat(Some("plan"), &[ChatMessage::user("hi")], Some(&format))
        .await
        .unwrap();

    assert_eq!(text, "{\"subtasks\": []}");
}

#[tokio::test]
async fn test_chat_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": "slow down"})))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, server.uri()));
    let err = client
        .chat(None, &[ChatMessage::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, EnsembleError::Http(_)));
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn test_dial_uses_deployment_url_and_api_key_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4o/chat/completions"))
        .and(query_param("api-version", "2025-01-01-preview"))
        .and(header("Api-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::Dial, server.uri()));
    let text = client
        .chat(None, &[ChatMessage::user("hi")], None)
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_chat_stream_yields_deltas_then_done() {
    let server = MockServer::start().await;

    let body = [
        r#"{"choices": [{"delta": {"role": "assistant"}}]}"#,
        r#"{"choices": [{"delta": {"content": "Hel"}}]}"#,
        r#"{"choices": [{"delta": {"content": "lo"}}]}"#,
        "[DONE]",
    ]
    .iter()
    .map(|l| format!("data: {l}\n\n"))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, server.uri()));
    let (mut rx, handle) = client
        .chat_stream(None, &[ChatMessage::user("hi")])
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let full = handle.await.unwrap().unwrap();

    assert_eq!(full, "Hello");
    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta {
                text: "Hel".to_string()
            },
            StreamEvent::TextDelta {
                text: "lo".to_string()
            },
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn test_chat_error_status_with_plain_text_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, server.uri()));
    let err = client
        .chat(None, &[ChatMessage::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, EnsembleError::Http(_)));
    let message = err.to_string();
    assert!(message.contains("503"));
    assert!(message.contains("upstream overloaded"));
}

#[tokio::test]
async fn test_chat_stream_reads_final_line_without_newline() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\": [{\"delta\": {\"content\": \"Hel\"}}]}\n\n",
        "data: {\"choices\": [{\"delta\": {\"content\": \"lo\"}}]}"
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, server.uri()));
    let (mut rx, handle) = client
        .chat_stream(None, &[ChatMessage::user("hi")])
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(handle.await.unwrap().unwrap(), "Hello");
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(
        events[1],
        StreamEvent::TextDelta {
            text: "lo".to_string()
        }
    );
}
