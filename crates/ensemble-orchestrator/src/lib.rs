//! Multi-agent orchestration engine.
//!
//! Answers one user request by splitting it into dependency-ordered subtasks,
//! dispatching each to a backend agent, feeding results between dependent
//! subtasks and synthesizing a final answer, in bounded rounds.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Runs a full conversation turn.
//! - [`DecompositionDriver`]: The bounded decompose → execute loop.
//! - [`SubtaskExecutor`]: Runs one round with per-subtask failure isolation.
//! - [`Aggregator`]: Streams the synthesized final answer.
//! - [`GatewayRegistry`]: Agent name → gateway dispatch table.

/// Final-answer synthesis.
pub mod aggregator;
/// Engine configuration.
pub mod config;
/// Decomposition collaborator and round loop.
pub mod driver;
/// Turn orchestration.
pub mod engine;
/// Per-round subtask execution.
pub mod executor;
/// Prompt text and result blocks.
pub mod prompts;
/// Cross-turn state recovery from the transcript.
pub mod recovery;
/// Dependency ordering of a round.
pub mod scheduler;
/// Subtask, decomposition and result types.
pub mod types;

pub use aggregator::Aggregator;
pub use config::{OrchestratorConfig, MAX_ROUNDS};
pub use driver::{Decomposer, DecompositionDriver, DriverOutcome};
pub use engine::{Orchestrator, TurnOutcome};
pub use executor::{resolve_context, GatewayRegistry, SubtaskExecutor};
pub use recovery::{persist_state, recover_state};
pub use scheduler::execution_order;
pub use types::{AgentName, AgentResult, Subtask, TaskDecomposition, TaskResult};
