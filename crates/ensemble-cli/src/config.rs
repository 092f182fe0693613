use anyhow::Context;
use ensemble_agent::{GpaGateway, GpaGatewayConfig, ModelConfig, UmsGateway, UmsGatewayConfig};
use ensemble_orchestrator::{AgentName, GatewayRegistry, OrchestratorConfig};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Environment variable used when a config `api_key` is left empty.
pub const API_KEY_ENV: &str = "ENSEMBLE_API_KEY";

#[derive(Debug, Deserialize)]
pub struct EnsembleConfig {
    /// Model used for decomposition and aggregation.
    pub model: ModelConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub gpa: Option<GpaGatewayConfig>,
    #[serde(default)]
    pub ums: Option<UmsGatewayConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_keys: vec![],
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5030
}

impl EnsembleConfig {
    /// Read and parse a config file, then fill empty API keys from the environment.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = Self::parse(&raw)?;
        Ok(config.with_api_key_fallback(std::env::var(API_KEY_ENV).ok()))
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("Invalid config")
    }

    /// Use `key` wherever the config left an API key empty.
    pub fn with_api_key_fallback(mut self, key: Option<String>) -> Self {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return self;
        };
        if self.model.api_key.is_empty() {
            self.model.api_key = key.clone();
        }
        if let Some(gpa) = self.agents.gpa.as_mut() {
            if gpa.api_key.is_empty() {
                gpa.api_key = key;
            }
        }
        self
    }

    /// One gateway per configured agent section.
    pub fn gateways(&self) -> GatewayRegistry {
        let mut registry = GatewayRegistry::new();
        if let Some(gpa) = &self.agents.gpa {
            registry.register(AgentName::Gpa, Arc::new(GpaGateway::new(gpa.clone())));
        }
        if let Some(ums) = &self.agents.ums {
            registry.register(AgentName::Ums, Arc::new(UmsGateway::new(ums.clone())));
        }
        registry
    }
}
