//! Agent gateways: one implementation per backend capability.
//!
//! A gateway executes a single subtask against its backend and reports back
//! whatever session state the backend needs persisted for the next call. It
//! never mutates orchestrator-owned state; it receives the current
//! [`TurnState`] by reference and returns a [`StateUpdate`].

/// General-purpose agent.
pub mod gpa;
/// User management service agent.
pub mod ums;

pub use gpa::{GpaGateway, GpaGatewayConfig};
pub use ums::{UmsGateway, UmsGatewayConfig};

use async_trait::async_trait;
use ensemble_core::{EnsembleResult, TurnState};

/// Separator placed between dependency context and the task itself.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Input for one gateway call.
#[derive(Debug, Clone, Copy)]
pub struct GatewayRequest<'a> {
    /// The subtask's own instruction.
    pub task_description: &'a str,
    /// Serialized result of the dependency, when it succeeded.
    pub context: Option<&'a str>,
    /// The state persisted so far in this conversation.
    pub state: &'a TurnState,
}

impl GatewayRequest<'_> {
    /// The text actually sent to the backend.
    ///
    /// With context: `"{context}\n\n---\n\nYour Task: {task_description}"`;
    /// without: the bare description.
    pub fn instruction(&self) -> String {
        match self.context {
            Some(context) if !context.is_empty() => format!(
                "{context}{CONTEXT_SEPARATOR}Your Task: {}",
                self.task_description
            ),
            _ => self.task_description.to_string(),
        }
    }
}

/// State a backend wants persisted after a successful call.
///
/// The two shapes are disjoint: a backend either owns a single remote session
/// id or an append-only list of message fragments.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// Nothing to persist.
    Unchanged,
    /// Replace the stored session id.
    SessionId(String),
    /// Append these fragments to the accumulated list.
    Fragments(Vec<serde_json::Value>),
}

/// Result of a successful gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// Text answer for the subtask.
    pub content: String,
    /// How the turn state changes.
    pub update: StateUpdate,
}

/// Interface through which the orchestrator invokes one backend capability.
///
/// An `Err` means the subtask failed; the executor records it on that subtask
/// and moves on.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Execute one subtask.
    async fn execute(&self, request: GatewayRequest<'_>) -> EnsembleResult<GatewayResponse>;
}
