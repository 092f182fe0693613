use crate::aggregator::Aggregator;
use crate::config::OrchestratorConfig;
use crate::driver::{last_user_content, Decomposer, DecompositionDriver};
use crate::executor::{GatewayRegistry, SubtaskExecutor};
use crate::prompts::{AGGREGATION_SYSTEM_PROMPT, DECOMPOSITION_SYSTEM_PROMPT};
use crate::recovery::{persist_state, recover_state};
use crate::types::{AgentName, TaskResult};
use ensemble_agent::{LlmClient, StreamEvent};
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult, TurnState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Everything a turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Assistant reply carrying the persisted state in `custom_content.state`.
    pub message: ChatMessage,
    /// All task results across rounds.
    pub task_results: Vec<TaskResult>,
    /// Decomposition calls made.
    pub rounds: u32,
    /// The state written onto `message`.
    pub state: TurnState,
}

/// The multi-agent orchestrator engine.
/// Implements the recover → decompose/execute rounds → aggregate → persist turn.
pub struct Orchestrator {
    driver: DecompositionDriver,
    aggregator: Aggregator,
}

impl Orchestrator {
    /// Build an engine from one LLM client (used for both decomposition and
    /// aggregation) and the registered agent gateways.
    pub fn new(
        llm: Arc<LlmClient>,
        gateways: GatewayRegistry,
        config: OrchestratorConfig,
    ) -> EnsembleResult<Self> {
        let config = config.validated()?;

        let decomposer = Decomposer::new(
            llm.clone(),
            config
                .decomposition_prompt
                .clone()
                .unwrap_or_else(|| DECOMPOSITION_SYSTEM_PROMPT.to_string()),
            config.decomposition_timeout(),
        );
        let executor = SubtaskExecutor::new(gateways, config.subtask_timeout());
        let aggregator = Aggregator::new(
            llm,
            config
                .aggregation_prompt
                .clone()
                .unwrap_or_else(|| AGGREGATION_SYSTEM_PROMPT.to_string()),
            config.aggregation_timeout(),
        );

        Ok(Self {
            driver: DecompositionDriver::new(decomposer, executor, config.max_rounds),
            aggregator,
        })
    }

    /// Agents this engine can dispatch to.
    pub fn agents(&self) -> Vec<AgentName> {
        self.driver.executor().gateways().agents()
    }

    /// Handle one conversation turn.
    ///
    /// Text of the final answer is forwarded to `sink` as it streams; the
    /// returned message holds the full answer and the state to persist.
    pub async fn handle_turn(
        &self,
        conversation: &[ChatMessage],
        sink: Option<mpsc::Sender<StreamEvent>>,
    ) -> EnsembleResult<TurnOutcome> {
        if last_user_content(conversation).is_none() {
            return Err(EnsembleError::InvalidRequest(
                "conversation has no user message".to_string(),
            ));
        }

        let turn_id = Uuid::new_v4();
        let start = Instant::now();
        let recovered = recover_state(conversation);
        info!(
            turn_id = %turn_id,
            messages = conversation.len(),
            ums_session = recovered.ums_conversation_id.is_some(),
            gpa_fragments = recovered.fragments().len(),
            "Turn started"
        );

        let outcome = self.driver.run(conversation, recovered).await?;

        let content = self
            .aggregator
            .aggregate(conversation, &outcome.results, sink.as_ref())
            .await?;

        let message = persist_state(ChatMessage::assistant(content), &outcome.state);

        info!(
            turn_id = %turn_id,
            rounds = outcome.rounds,
            tasks = outcome.results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnOutcome {
            message,
            task_results: outcome.results,
            rounds: outcome.rounds,
            state: outcome.state,
        })
    }
}
