use ensemble_core::{EnsembleError, EnsembleResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Hard cap on decomposition rounds per turn.
pub const MAX_ROUNDS: u32 = 10;

/// Engine settings, read from the `[orchestrator]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Decomposition calls per turn; clamped to [`MAX_ROUNDS`].
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Deadline for one decomposition call.
    #[serde(default = "default_decomposition_timeout")]
    pub decomposition_timeout_secs: u64,
    /// Deadline for one agent call.
    #[serde(default = "default_subtask_timeout")]
    pub subtask_timeout_secs: u64,
    /// Deadline for the whole aggregation stream.
    #[serde(default = "default_aggregation_timeout")]
    pub aggregation_timeout_secs: u64,
    /// Replaces the built-in decomposition system prompt.
    #[serde(default)]
    pub decomposition_prompt: Option<String>,
    /// Replaces the built-in aggregation system prompt.
    #[serde(default)]
    pub aggregation_prompt: Option<String>,
}

fn default_max_rounds() -> u32 {
    MAX_ROUNDS
}

fn default_decomposition_timeout() -> u64 {
    60
}

fn default_subtask_timeout() -> u64 {
    120
}

fn default_aggregation_timeout() -> u64 {
    180
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            decomposition_timeout_secs: default_decomposition_timeout(),
            subtask_timeout_secs: default_subtask_timeout(),
            aggregation_timeout_secs: default_aggregation_timeout(),
            decomposition_prompt: None,
            aggregation_prompt: None,
        }
    }
}

impl OrchestratorConfig {
    /// Reject unusable values and clamp `max_rounds` to [`MAX_ROUNDS`].
    pub fn validated(mut self) -> EnsembleResult<Self> {
        if self.max_rounds == 0 {
            return Err(EnsembleError::Config(
                "orchestrator.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.max_rounds > MAX_ROUNDS {
            warn!(
                requested = self.max_rounds,
                cap = MAX_ROUNDS,
                "max_rounds above cap, clamping"
            );
            self.max_rounds = MAX_ROUNDS;
        }
        for (name, secs) in [
            ("decomposition_timeout_secs", self.decomposition_timeout_secs),
            ("subtask_timeout_secs", self.subtask_timeout_secs),
            ("aggregation_timeout_secs", self.aggregation_timeout_secs),
        ] {
            if secs == 0 {
                return Err(EnsembleError::Config(format!(
                    "orchestrator.{name} must be positive"
                )));
            }
        }
        Ok(self)
    }

    /// `decomposition_timeout_secs` as a duration.
    pub fn decomposition_timeout(&self) -> Duration {
        Duration::from_secs(self.decomposition_timeout_secs)
    }

    /// `subtask_timeout_secs` as a duration.
    pub fn subtask_timeout(&self) -> Duration {
        Duration::from_secs(self.subtask_timeout_secs)
    }

    /// `aggregation_timeout_secs` as a duration.
    pub fn aggregation_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregation_timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.subtask_timeout(), Duration::from_secs(120));
        assert!(config.decomposition_prompt.is_none());
    }

    #[test]
    fn test_max_rounds_is_clamped() {
        let config = OrchestratorConfig {
            max_rounds: 50,
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(config.max_rounds, MAX_ROUNDS);
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let err = OrchestratorConfig {
            max_rounds: 0,
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, EnsembleError::Config(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = OrchestratorConfig {
            aggregation_timeout_secs: 0,
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(err.to_string().contains("aggregation_timeout_secs"));
    }
}
