use crate::scheduler::execution_order;
use crate::types::{AgentName, AgentResult, Subtask, TaskResult};
use ensemble_agent::{AgentGateway, GatewayRequest, StateUpdate};
use ensemble_core::{EnsembleError, EnsembleResult, TurnState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Maps each agent capability to the gateway that serves it.
#[derive(Default, Clone)]
pub struct GatewayRegistry {
    gateways: HashMap<AgentName, Arc<dyn AgentGateway>>,
}

impl GatewayRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the gateway for an agent.
    pub fn register(&mut self, agent: AgentName, gateway: Arc<dyn AgentGateway>) {
        self.gateways.insert(agent, gateway);
    }

    /// Builder form of [`GatewayRegistry::register`].
    pub fn with(mut self, agent: AgentName, gateway: Arc<dyn AgentGateway>) -> Self {
        self.register(agent, gateway);
        self
    }

    /// Gateway registered for `agent`.
    pub fn get(&self, agent: AgentName) -> Option<&Arc<dyn AgentGateway>> {
        self.gateways.get(&agent)
    }

    /// Registered agents, sorted for stable output.
    pub fn agents(&self) -> Vec<AgentName> {
        let mut agents: Vec<AgentName> = self.gateways.keys().copied().collect();
        agents.sort_by_key(|a| a.to_string());
        agents
    }
}

/// Context handed to a subtask: the serialized result of its dependency, only
/// when that dependency succeeded.
///
/// Results of the current round take precedence; otherwise the most recent
/// earlier-round result with that id is used. A failed or missing dependency
/// yields no context, never an error.
pub fn resolve_context(
    subtask: &Subtask,
    completed: &[TaskResult],
    prior: &[TaskResult],
) -> Option<String> {
    let dep = subtask.depends_on?;
    let found = match completed.iter().find(|r| r.task_id() == dep) {
        Some(result) => Some(result),
        None => prior.iter().rev().find(|r| r.task_id() == dep),
    };
    found.filter(|r| r.succeeded()).map(TaskResult::to_json)
}

/// Runs one round of subtasks against their gateways.
///
/// Subtasks run one at a time in scheduler order. A failing or timed-out
/// gateway call is recorded on that subtask and the round continues.
pub struct SubtaskExecutor {
    gateways: GatewayRegistry,
    timeout: Duration,
}

impl SubtaskExecutor {
    /// `timeout` applies to each agent call.
    pub fn new(gateways: GatewayRegistry, timeout: Duration) -> Self {
        Self { gateways, timeout }
    }

    /// Registered gateways.
    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    /// Execute a round and return its results in execution order.
    ///
    /// `prior` holds every earlier round's results; `state` is the turn's
    /// session accumulator and is the only thing this call mutates.
    pub async fn execute(
        &self,
        subtasks: &[Subtask],
        prior: &[TaskResult],
        state: &mut TurnState,
    ) -> EnsembleResult<Vec<TaskResult>> {
        let order = execution_order(subtasks, prior)?;

        if let Some(missing) = subtasks
            .iter()
            .find(|t| self.gateways.get(t.agent_name).is_none())
        {
            return Err(EnsembleError::UnknownAgent(format!(
                "no gateway registered for {} (task {})",
                missing.agent_name, missing.task_id
            )));
        }

        let by_id: HashMap<u32, &Subtask> = subtasks.iter().map(|t| (t.task_id, t)).collect();
        let mut results: Vec<TaskResult> = Vec::with_capacity(subtasks.len());

        for task_id in order {
            let Some(subtask) = by_id.get(&task_id).copied() else {
                continue;
            };
            let context = resolve_context(subtask, &results, prior);
            let agent_result = self.run_one(subtask, context.as_deref(), state).await;
            results.push(TaskResult::new(subtask.clone(), agent_result));
        }

        Ok(results)
    }

    async fn run_one(
        &self,
        subtask: &Subtask,
        context: Option<&str>,
        state: &mut TurnState,
    ) -> AgentResult {
        let Some(gateway) = self.gateways.get(subtask.agent_name) else {
            return AgentResult::failed(subtask, "no gateway registered");
        };

        info!(
            task_id = subtask.task_id,
            agent = %subtask.agent_name,
            gateway = gateway.name(),
            has_context = context.is_some(),
            "Executing subtask"
        );
        let start = Instant::now();

        let request = GatewayRequest {
            task_description: &subtask.task_description,
            context,
            state: &*state,
        };
        let outcome = match tokio::time::timeout(self.timeout, gateway.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(EnsembleError::timeout(
                format!("{} gateway, task {}", subtask.agent_name, subtask.task_id),
                self.timeout,
            )),
        };

        match outcome {
            Ok(response) => {
                merge_state(state, response.update);
                info!(
                    task_id = subtask.task_id,
                    agent = %subtask.agent_name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Subtask completed"
                );
                AgentResult::succeeded(subtask, response.content)
            }
            Err(e) => {
                error!(
                    task_id = subtask.task_id,
                    agent = %subtask.agent_name,
                    error = %e,
                    "Subtask failed"
                );
                AgentResult::failed(subtask, e.to_string())
            }
        }
    }
}

/// Fold a gateway's reported state into the turn accumulator.
pub fn merge_state(state: &mut TurnState, update: StateUpdate) {
    match update {
        StateUpdate::Unchanged => {}
        StateUpdate::SessionId(id) => state.ums_conversation_id = Some(id),
        StateUpdate::Fragments(fragments) => state.append_fragments(fragments),
    }
}
