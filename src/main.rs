use std::sync::Arc;

use clap::{Parser, Subcommand};

use autoclerk::agent::AgentEngine;
use autoclerk::auth::AuthManager;
use autoclerk::config::Config;
use autoclerk::llm::GroqProvider;
use autoclerk::server::{self, AppState};
use autoclerk::tools::{google, Dispatcher, ToolRegistry};

#[derive(Parser)]
#[command(name = "autoclerk", about = "Office automation assistant backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Print the stored Google authorization status and exit.
    AuthStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoclerk=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::AuthStatus => auth_status(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let auth = Arc::new(AuthManager::new(config.google.clone()));
    let provider = Arc::new(GroqProvider::new(config.llm.clone())?);
    tracing::info!(model = %config.llm.model, "Model provider ready");

    let registry = Arc::new(ToolRegistry::new(google::all_tools())?);
    tracing::info!(tools = registry.len(), "Capability registry built");

    let dispatcher = Arc::new(Dispatcher::new(registry, auth.clone()));
    let engine = Arc::new(AgentEngine::new(provider, dispatcher, auth.clone()));

    server::serve(&config.server, AppState { engine, auth }).await
}

async fn auth_status(config: Config) -> anyhow::Result<()> {
    let auth = AuthManager::new(config.google);
    let status = auth.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
