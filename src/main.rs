mod config;
mod llm;
mod orchestrator;
mod prompts;
mod server;
mod stream;
mod tools;
mod types;

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use llm::ollama::OllamaGateway;
use orchestrator::Orchestrator;
use server::AppState;
use tools::create_default_registry;

#[derive(Parser, Debug)]
#[command(name = "macpilot", version, about = "Local macOS automation assistant backend")]
struct Cli {
    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,
    /// Bind port (overrides config)
    #[arg(long)]
    port: Option<u16>,
    /// Model name (overrides config)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Auto-generate config file on first run
    let config_path = AppConfig::config_path()?;
    if !config_path.exists() {
        let path = AppConfig::save_default()?;
        info!(path = %path.display(), "created default config");
    }

    let mut config = AppConfig::load()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }

    info!(
        model = %config.llm.model,
        backend = %config.llm.base_url,
        max_tool_iterations = config.orchestrator.max_tool_iterations,
        "starting"
    );

    let gateway = Arc::new(OllamaGateway::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    ));
    let registry = Arc::new(create_default_registry());
    info!(tools = registry.len(), "tool registry built");

    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        registry,
        config.orchestrator.clone(),
        prompts::SYSTEM_PROMPT,
    ));

    let state = AppState {
        orchestrator,
        model: config.llm.model.clone(),
    };
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    server::serve(state, addr).await
}
