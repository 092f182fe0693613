mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::EnsembleConfig;
use ensemble_agent::{LlmClient, StreamEvent};
use ensemble_core::ChatMessage;
use ensemble_gateway::{ApiKeys, GatewayServer};
use ensemble_orchestrator::{AgentName, Orchestrator};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensemble", about = "Ensemble multi-agent task orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ensemble.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a single turn from the terminal
    Ask {
        /// The user message
        prompt: String,
        /// JSON file with the prior conversation (array of messages)
        #[arg(short, long)]
        transcript: Option<PathBuf>,
        /// Append this turn to the transcript file
        #[arg(long, requires = "transcript")]
        save: bool,
    },
    /// List configured agents
    Agents,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));

    let config = EnsembleConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let orchestrator = build_orchestrator(&config)?;
            info!(agents = ?orchestrator.agents(), "Orchestrator ready");

            let keys = ApiKeys::new(config.server.api_keys.clone());
            if !keys.is_empty() {
                info!(keys = keys.len(), "API key auth enabled");
            }
            let app = GatewayServer::build_with_auth(Arc::new(orchestrator), keys);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Ensemble gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Ask {
            prompt,
            transcript,
            save,
        } => {
            let orchestrator = build_orchestrator(&config)?;
            let mut conversation = match &transcript {
                Some(path) => read_transcript(path).await?,
                None => Vec::new(),
            };
            conversation.push(ChatMessage::user(prompt));

            let (tx, mut rx) = mpsc::channel(64);
            let printer = tokio::spawn(async move {
                let mut stdout = std::io::stdout();
                while let Some(event) = rx.recv().await {
                    if let StreamEvent::TextDelta { text } = event {
                        let _ = write!(stdout, "{text}");
                        let _ = stdout.flush();
                    }
                }
                let _ = writeln!(stdout);
            });

            let outcome = orchestrator.handle_turn(&conversation, Some(tx)).await;
            let _ = printer.await;
            let outcome = outcome?;

            let failed = outcome
                .task_results
                .iter()
                .filter(|r| !r.succeeded())
                .count();
            info!(
                rounds = outcome.rounds,
                tasks = outcome.task_results.len(),
                failed,
                "Turn finished"
            );

            if let (true, Some(path)) = (save, transcript) {
                conversation.push(outcome.message);
                let raw = serde_json::to_string_pretty(&conversation)?;
                tokio::fs::write(&path, raw)
                    .await
                    .with_context(|| format!("Failed to write transcript '{}'", path.display()))?;
                info!(path = %path.display(), "Transcript saved");
            }
        }
        Commands::Agents => {
            let registry = config.gateways();
            let agents = registry.agents();
            if agents.is_empty() {
                println!("No agents configured.");
                println!("Configure agents in ensemble.toml under [agents.gpa] / [agents.ums]");
            } else {
                println!("Configured agents:");
                for agent in &agents {
                    let detail = match agent {
                        AgentName::Gpa => config
                            .agents
                            .gpa
                            .as_ref()
                            .map(|g| format!("{} via {}", g.model, g.endpoint)),
                        AgentName::Ums => {
                            config.agents.ums.as_ref().map(|u| u.endpoint.clone())
                        }
                    };
                    println!("  {agent}: {}", detail.unwrap_or_default());
                }
                println!("\nTotal: {} agent(s)", agents.len());
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &EnsembleConfig) -> anyhow::Result<Orchestrator> {
    let llm = Arc::new(LlmClient::new(config.model.clone()));
    Orchestrator::new(llm, config.gateways(), config.orchestrator.clone())
        .context("Invalid orchestrator config")
}

async fn read_transcript(path: &Path) -> anyhow::Result<Vec<ChatMessage>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(Vec::new());
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read transcript '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Transcript '{}' is not a JSON message array", path.display()))
}
