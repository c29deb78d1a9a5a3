//! Start command - launches the gateway server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use portico_server::{Server, ServerConfig};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Directory served as the application (overrides config)
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Disable per-request logging
    #[arg(long)]
    pub no_request_log: bool,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let mut config = ServerConfig::from_config(&ctx.config, ctx.deployment)?;

    if args.bind.is_some() || args.port.is_some() {
        let file = ctx.config.server();
        let bind = args.bind.unwrap_or(file.bind);
        let port = args.port.unwrap_or(file.port);
        let addr: SocketAddr = format!("{}:{}", bind, port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;
        config = config.with_bind_address(addr);
    }
    if let Some(dir) = args.static_dir {
        config = config.with_static_dir(dir);
    }
    if args.no_request_log {
        config = config.with_request_logging(false);
    }

    if let Some(dir) = &config.static_dir
        && !dir.is_dir()
    {
        anyhow::bail!("Static directory {} does not exist", dir.display());
    }

    let addr = config.bind_address;
    if !ctx.json_output {
        println!("Portico listening on http://{}", addr);
        println!("  deployment: {}", config.deployment);
        println!("  upstream:   {}", config.upstream());
    }

    let server = Server::new(config)?;
    server
        .run_until(addr, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
            }
        })
        .await?;

    Ok(())
}
