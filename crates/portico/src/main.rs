//! Portico - session-gated API gateway
//!
//! Main entry point for the Portico CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use portico_config::{Deployment, LoadedConfig};

mod commands;

use commands::{auth, get, routes, start, token};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Portico - session-gated API gateway for the admin console
#[derive(Parser)]
#[command(name = "portico")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to load instead of the discovered layers
    #[arg(long, global = true, env = "PORTICO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deployment mode (development, ci, production)
    #[arg(long, global = true)]
    pub deployment: Option<Deployment>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Start(start::StartArgs),

    /// Show the resolved service route table
    Routes(routes::RoutesArgs),

    /// Session management (login, refresh, logout, status)
    Auth(auth::AuthArgs),

    /// Inspect bearer tokens
    Token(token::TokenArgs),

    /// Issue a GET through a service's gateway client
    Get(get::GetArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "portico=debug,portico_server=debug,portico_client=debug,portico_auth=debug,portico_config=debug,info"
    } else {
        "portico=info,portico_server=info,portico_client=warn,portico_auth=warn,warn"
    };

    let log_dir = portico_config::data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "portico.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "portico=trace,portico_server=trace,portico_client=trace,portico_auth=trace,portico_config=trace,info",
                )),
        )
        .init();

    // Config is read once; everything below sees the same snapshot.
    let loaded = match &cli.config {
        Some(path) => LoadedConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => portico_config::load_config(None).context("Failed to load config")?,
    };
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let deployment = match cli.deployment.or(loaded.config.deployment()) {
        Some(deployment) => deployment,
        None => Deployment::detect().context("Failed to detect deployment mode")?,
    };
    tracing::debug!(%deployment, sources = ?loaded.loaded_from(), "Configuration loaded");

    // Create context for commands
    let ctx = commands::Context {
        config: loaded.config,
        deployment,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Routes(args) => routes::run(args, &ctx).await,
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Token(args) => token::run(args, &ctx).await,
        Commands::Get(args) => get::run(args, &ctx).await,
    }
}
