use super::{AgentGateway, GatewayRequest, GatewayResponse, StateUpdate};
use crate::backends::openai::delta_content;
use crate::sse::{is_done, SseDecoder};
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the UMS agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmsGatewayConfig {
    /// Base URL of the UMS agent.
    pub endpoint: String,
    /// Deadline for creating a conversation.
    #[serde(default = "default_create_timeout")]
    pub create_timeout_secs: u64,
    /// Deadline for one chat call, stream included.
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
    /// Title given to conversations we create.
    #[serde(default = "default_title")]
    pub conversation_title: String,
}

fn default_create_timeout() -> u64 {
    30
}

fn default_chat_timeout() -> u64 {
    60
}

fn default_title() -> String {
    "UMS Agent Conversation".to_string()
}

impl UmsGatewayConfig {
    /// Default timeouts and title.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            create_timeout_secs: default_create_timeout(),
            chat_timeout_secs: default_chat_timeout(),
            conversation_title: default_title(),
        }
    }
}

#[derive(Deserialize)]
struct CreatedConversation {
    id: String,
}

/// Gateway for the user-management-service agent.
///
/// The UMS agent keeps the conversation on its side, so every call needs a
/// remote conversation id. One of our conversations maps to exactly one UMS
/// conversation: the id is created on first use and persisted on the
/// transcript afterwards.
pub struct UmsGateway {
    config: UmsGatewayConfig,
    http: reqwest::Client,
}

impl UmsGateway {
    /// Gateway for the UMS agent at `config.endpoint`.
    pub fn new(config: UmsGatewayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    /// Create a conversation on the UMS side and return its id.
    pub async fn create_conversation(&self) -> EnsembleResult<String> {
        let resp = self
            .http
            .post(format!("{}/conversations", self.endpoint()))
            .json(&serde_json::json!({"title": self.config.conversation_title}))
            .timeout(Duration::from_secs(self.config.create_timeout_secs))
            .send()
            .await
            .map_err(|e| EnsembleError::Http(format!("UMS create conversation: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnsembleError::Agent(format!(
                "UMS create conversation failed {status}: {body}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| EnsembleError::Http(format!("UMS create conversation: {e}")))?;
        let created: CreatedConversation = serde_json::from_str(&body)?;
        Ok(created.id)
    }

    async fn chat(&self, conversation_id: &str, message: &str) -> EnsembleResult<String> {
        let resp = self
            .http
            .post(format!(
                "{}/conversations/{conversation_id}/chat",
                self.endpoint()
            ))
            .json(&serde_json::json!({
                "message": {"role": "user", "content": message},
                "stream": true,
            }))
            .timeout(Duration::from_secs(self.config.chat_timeout_secs))
            .send()
            .await
            .map_err(|e| EnsembleError::Http(format!("UMS chat: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnsembleError::Agent(format!(
                "UMS chat failed {status}: {body}"
            )));
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut content = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| EnsembleError::Http(format!("UMS stream: {e}")))?;
            for payload in decoder.push(&chunk) {
                if is_done(&payload) {
                    return Ok(content);
                }
                accumulate(&payload, &mut content);
            }
        }
        if let Some(payload) = decoder.finish() {
            if !is_done(&payload) {
                accumulate(&payload, &mut content);
            }
        }
        Ok(content)
    }
}

fn accumulate(payload: &str, content: &mut String) {
    let data: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            debug!(payload = %payload, "Skipping malformed UMS chunk");
            return;
        }
    };
    if data.get("conversation_id").is_some() {
        return;
    }
    if let Some(delta) = delta_content(&data) {
        content.push_str(delta);
    }
}

#[async_trait]
impl AgentGateway for UmsGateway {
    fn name(&self) -> &str {
        "UMS"
    }

    async fn execute(&self, request: GatewayRequest<'_>) -> EnsembleResult<GatewayResponse> {
        let conversation_id = match &request.state.ums_conversation_id {
            Some(id) => id.clone(),
            None => {
                let id = self.create_conversation().await?;
                info!(conversation_id = %id, "Created UMS conversation");
                id
            }
        };

        let content = self.chat(&conversation_id, &request.instruction()).await?;

        Ok(GatewayResponse {
            content,
            update: StateUpdate::SessionId(conversation_id),
        })
    }
}
