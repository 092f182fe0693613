use crate::executor::SubtaskExecutor;
use crate::prompts::decomposition_user_content;
use crate::types::{TaskDecomposition, TaskResult};
use ensemble_agent::{LlmClient, ResponseFormat};
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult, Role, TurnState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Copy of the conversation with `content` in place of the latest user message.
pub(crate) fn with_last_user_content(
    conversation: &[ChatMessage],
    content: String,
) -> Vec<ChatMessage> {
    let mut messages = conversation.to_vec();
    if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
        last_user.content = content;
    }
    messages
}

/// Latest user message content, if the conversation has one.
pub(crate) fn last_user_content(conversation: &[ChatMessage]) -> Option<&str> {
    conversation
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

/// Asks the decomposition collaborator for the next batch of subtasks.
pub struct Decomposer {
    llm: Arc<LlmClient>,
    system_prompt: String,
    timeout: Duration,
    response_format: ResponseFormat,
}

impl Decomposer {
    /// Decomposer with its own system prompt and per-call deadline.
    pub fn new(llm: Arc<LlmClient>, system_prompt: impl Into<String>, timeout: Duration) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(TaskDecomposition))
            .unwrap_or_default();
        Self {
            llm,
            system_prompt: system_prompt.into(),
            timeout,
            response_format: ResponseFormat::json_schema("task_decomposition", schema),
        }
    }

    /// One decomposition call. Any collaborator failure, timeout, or
    /// non-conformant output is fatal to the turn.
    pub async fn decompose(
        &self,
        conversation: &[ChatMessage],
        prior: &[TaskResult],
    ) -> EnsembleResult<TaskDecomposition> {
        let messages = if prior.is_empty() {
            conversation.to_vec()
        } else {
            let original = last_user_content(conversation).unwrap_or_default();
            with_last_user_content(conversation, decomposition_user_content(prior, original))
        };

        let call = self.llm.chat(
            Some(&self.system_prompt),
            &messages,
            Some(&self.response_format),
        );
        let raw = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| EnsembleError::timeout("task decomposition", self.timeout))?
            .map_err(|e| EnsembleError::Decomposition(e.to_string()))?;

        let decomposition: TaskDecomposition = serde_json::from_str(&raw).map_err(|e| {
            EnsembleError::Decomposition(format!("output does not match schema: {e}"))
        })?;

        info!(
            subtasks = decomposition.subtasks.len(),
            stop = decomposition.stop,
            "Task decomposition received"
        );
        Ok(decomposition)
    }
}

/// What a full decomposition loop produced.
#[derive(Debug, Clone)]
pub struct DriverOutcome {
    /// Every round's results, in execution order, oldest round first.
    pub results: Vec<TaskResult>,
    /// Session state after the last executed round.
    pub state: TurnState,
    /// Number of decomposition calls made.
    pub rounds: u32,
}

/// Drives decomposition rounds until the collaborator stops or the cap is hit.
pub struct DecompositionDriver {
    decomposer: Decomposer,
    executor: SubtaskExecutor,
    max_rounds: u32,
}

impl DecompositionDriver {
    /// Loop of at most `max_rounds` decomposition calls.
    pub fn new(decomposer: Decomposer, executor: SubtaskExecutor, max_rounds: u32) -> Self {
        Self {
            decomposer,
            executor,
            max_rounds,
        }
    }

    /// The executor each round runs on.
    pub fn executor(&self) -> &SubtaskExecutor {
        &self.executor
    }

    /// Run the loop. `state` is threaded through every round and handed back.
    pub async fn run(
        &self,
        conversation: &[ChatMessage],
        mut state: TurnState,
    ) -> EnsembleResult<DriverOutcome> {
        let mut results: Vec<TaskResult> = Vec::new();
        let mut rounds = 0;

        while rounds < self.max_rounds {
            rounds += 1;

            let decomposition = self.decomposer.decompose(conversation, &results).await?;
            if decomposition.is_final() {
                info!(round = rounds, "Decomposition requested stop");
                break;
            }

            let wave = self
                .executor
                .execute(&decomposition.subtasks, &results, &mut state)
                .await?;

            let failed = wave.iter().filter(|r| !r.succeeded()).count();
            info!(
                round = rounds,
                executed = wave.len(),
                failed,
                "Round complete"
            );
            results.extend(wave);

            if rounds == self.max_rounds {
                warn!(
                    max_rounds = self.max_rounds,
                    "Round cap reached, aggregating available results"
                );
            }
        }

        Ok(DriverOutcome {
            results,
            state,
            rounds,
        })
    }
}
