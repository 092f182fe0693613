use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backend capabilities a subtask can be delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentName {
    /// General-purpose agent: web search, code execution, file and image work.
    Gpa,
    /// User management service agent: create, read, update and delete users.
    Ums,
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentName::Gpa => write!(f, "GPA"),
            AgentName::Ums => write!(f, "UMS"),
        }
    }
}

/// One unit of delegated work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Subtask {
    /// Positive id, unique within this decomposition round.
    pub task_id: u32,
    /// Agent that should perform the task.
    pub agent_name: AgentName,
    /// Self-contained instruction for the agent.
    pub task_description: String,
    /// Id of a task whose result this task needs, if any.
    #[serde(default)]
    pub depends_on: Option<u32>,
}

impl Subtask {
    /// Subtask with no dependency.
    pub fn new(task_id: u32, agent_name: AgentName, task_description: impl Into<String>) -> Self {
        Self {
            task_id,
            agent_name,
            task_description: task_description.into(),
            depends_on: None,
        }
    }

    /// Make this subtask wait for `task_id`.
    pub fn depends_on(mut self, task_id: u32) -> Self {
        self.depends_on = Some(task_id);
        self
    }
}

/// The decomposition collaborator's output for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskDecomposition {
    /// Subtasks to run this round, in the order they were planned.
    pub subtasks: Vec<Subtask>,
    /// Set when the collected results already answer the request.
    #[serde(default)]
    pub stop: bool,
}

impl TaskDecomposition {
    /// An empty subtask list means stop, whatever the flag says.
    pub fn is_final(&self) -> bool {
        self.stop || self.subtasks.is_empty()
    }
}

/// Outcome of executing one subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Subtask this result belongs to.
    pub task_id: u32,
    /// Agent that ran it.
    pub agent_name: AgentName,
    /// Agent answer; empty on failure.
    pub content: String,
    /// Whether the agent call succeeded.
    pub success: bool,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    /// Successful result carrying `content`.
    pub fn succeeded(task: &Subtask, content: impl Into<String>) -> Self {
        Self {
            task_id: task.task_id,
            agent_name: task.agent_name,
            content: content.into(),
            success: true,
            error: None,
        }
    }

    /// Failed result with empty content.
    pub fn failed(task: &Subtask, error: impl Into<String>) -> Self {
        Self {
            task_id: task.task_id,
            agent_name: task.agent_name,
            content: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A subtask paired with its result; the unit handed to later rounds and to aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The subtask as planned.
    pub task: Subtask,
    /// What the agent returned.
    pub agent_result: AgentResult,
}

impl TaskResult {
    /// Pair a subtask with its result.
    pub fn new(task: Subtask, agent_result: AgentResult) -> Self {
        Self { task, agent_result }
    }

    /// Id of the subtask.
    pub fn task_id(&self) -> u32 {
        self.task.task_id
    }

    /// Whether the agent call succeeded.
    pub fn succeeded(&self) -> bool {
        self.agent_result.success
    }

    /// Compact single-line JSON, as placed into prompts and dependency context.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
