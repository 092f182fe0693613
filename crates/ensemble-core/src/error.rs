use thiserror::Error;

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Top-level error type for the Ensemble orchestrator.
///
/// Each variant corresponds to a subsystem or failure class. Only some of them
/// are fatal to a turn: gateway and timeout errors raised while executing a
/// single subtask are caught by the executor and recorded on that subtask.
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// An error returned by a backend agent while executing a subtask.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP request (LLM API, agent endpoint).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The decomposition collaborator failed or returned non-conformant output.
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// The aggregation collaborator could not be started.
    #[error("Aggregation error: {0}")]
    Aggregation(String),

    /// A round's subtasks declared invalid dependencies.
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// A subtask named an agent with no registered gateway.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// An outbound call exceeded its deadline.
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// The deadline that elapsed.
        seconds: u64,
    },

    /// The incoming request cannot be processed (e.g. no user message).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnsembleError {
    /// Build a [`EnsembleError::Timeout`] from a duration.
    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds: after.as_secs(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = EnsembleError::UnknownAgent("WEATHER".to_string());
        assert_eq!(err.to_string(), "Unknown agent: WEATHER");

        let err = EnsembleError::timeout("subtask 3", Duration::from_secs(120));
        assert_eq!(err.to_string(), "Timed out after 120s: subtask 3");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: EnsembleError = parse.unwrap_err().into();
        assert!(matches!(err, EnsembleError::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }
}
