//! LLM client and backend agent gateways for Ensemble.
//!
//! Two families of outbound calls live here:
//!
//! - [`LlmClient`] talks to an OpenAI-compatible chat completions API and is
//!   what the orchestrator uses for decomposition and aggregation.
//! - [`AgentGateway`] implementations ([`GpaGateway`], [`UmsGateway`]) execute
//!   a single subtask against one backend agent and own that backend's
//!   session state shape.

/// Chat completion transports.
pub mod backends;
/// Provider and model settings.
pub mod config;
pub mod gateways;
/// The LLM client the engine calls.
pub mod llm;
pub mod sse;
/// Events of a streamed completion.
pub mod stream;

pub use config::{LlmProvider, ModelConfig};
pub use gateways::{
    AgentGateway, GatewayRequest, GatewayResponse, GpaGateway, GpaGatewayConfig, StateUpdate,
    UmsGateway, UmsGatewayConfig,
};
pub use llm::{LlmClient, ResponseFormat};
pub use sse::SseDecoder;
pub use stream::StreamEvent;
