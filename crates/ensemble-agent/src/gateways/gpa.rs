use super::{AgentGateway, GatewayRequest, GatewayResponse, StateUpdate};
use crate::backends::openai::{delta_content, OpenAiBackend};
use crate::config::{
    default_api_version, default_max_tokens, default_temperature, LlmProvider, ModelConfig,
};
use crate::sse::{is_done, SseDecoder};
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for the general-purpose agent deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpaGatewayConfig {
    /// Base URL of the deployment host.
    pub endpoint: String,
    /// Deployment name.
    pub model: String,
    /// Empty means "fill from the environment".
    #[serde(default)]
    pub api_key: String,
    /// Wire dialect; DIAL unless stated.
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    /// DIAL `api-version` query value.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Deadline for one call, stream included.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> LlmProvider {
    LlmProvider::Dial
}

fn default_timeout() -> u64 {
    120
}

impl GpaGatewayConfig {
    /// Settings for a DIAL deployment with default timeout.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: String::new(),
            provider: default_provider(),
            api_version: default_api_version(),
            timeout_secs: default_timeout(),
        }
    }

    /// The chat completions settings these keys describe.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            provider: self.provider,
            model_id: self.model.clone(),
            api_key: self.api_key.clone(),
            api_base_url: Some(self.endpoint.clone()),
            api_version: self.api_version.clone(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Gateway for the general-purpose agent (GPA).
///
/// The GPA is a chat completions deployment without server-side memory. Its
/// history is the list of message fragments accumulated across calls and
/// turns; each call replays that list and returns the new user/assistant pair
/// to append. Tool-call state the deployment reports in
/// `delta.custom_content.state` is kept on the assistant fragment so the
/// deployment sees it again next time.
pub struct GpaGateway {
    backend: OpenAiBackend,
    timeout: Duration,
}

impl GpaGateway {
    /// Gateway for the deployment `config` names.
    pub fn new(config: GpaGatewayConfig) -> Self {
        Self {
            backend: OpenAiBackend::new(config.model_config()),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn build_body(&self, fragments: &[serde_json::Value], instruction: &str) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = fragments.to_vec();
        messages.push(user_fragment(instruction));
        serde_json::json!({
            "model": self.backend.config().model_id,
            "max_tokens": self.backend.config().max_tokens,
            "temperature": self.backend.config().temperature,
            "messages": messages,
            "stream": true,
        })
    }
}

/// Fold one streamed payload into the answer and the latest deployment state.
fn apply_chunk(payload: &str, content: &mut String, state: &mut Option<serde_json::Value>) {
    let event: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            debug!(payload = %payload, "Skipping malformed GPA chunk");
            return;
        }
    };
    if let Some(delta) = delta_content(&event) {
        content.push_str(delta);
    }
    let reported = &event["choices"][0]["delta"]["custom_content"]["state"];
    if !reported.is_null() {
        *state = Some(reported.clone());
    }
}

fn user_fragment(instruction: &str) -> serde_json::Value {
    serde_json::json!({"role": "user", "content": instruction})
}

fn assistant_fragment(content: &str, state: Option<serde_json::Value>) -> serde_json::Value {
    let mut fragment = serde_json::json!({"role": "assistant", "content": content});
    if let Some(state) = state {
        fragment["custom_content"] = serde_json::json!({"state": state});
    }
    fragment
}

#[async_trait]
impl AgentGateway for GpaGateway {
    fn name(&self) -> &str {
        "GPA"
    }

    async fn execute(&self, request: GatewayRequest<'_>) -> EnsembleResult<GatewayResponse> {
        let instruction = request.instruction();
        let body = self.build_body(request.state.fragments(), &instruction);

        let resp = self
            .backend
            .completions_request()
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EnsembleError::Http(format!("GPA request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnsembleError::Agent(format!(
                "GPA request failed {status}: {body}"
            )));
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut content = String::new();
        let mut backend_state: Option<serde_json::Value> = None;
        let mut done = false;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| EnsembleError::Http(format!("GPA stream: {e}")))?;
            for payload in decoder.push(&chunk) {
                if is_done(&payload) {
                    done = true;
                    break 'read;
                }
                apply_chunk(&payload, &mut content, &mut backend_state);
            }
        }
        if !done {
            if let Some(payload) = decoder.finish().filter(|p| !is_done(p)) {
                apply_chunk(&payload, &mut content, &mut backend_state);
            }
        }

        let fragments = vec![
            user_fragment(&instruction),
            assistant_fragment(&content, backend_state),
        ];

        Ok(GatewayResponse {
            content,
            update: StateUpdate::Fragments(fragments),
        })
    }
}
