//! CLI command handlers.

pub mod auth;
pub mod get;
pub mod routes;
pub mod start;
pub mod token;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use portico_auth::{SharedCredentialStore, create_file_store};
use portico_client::{GatewayClients, ServiceRouter};
use portico_config::{Deployment, Environment, PorticoConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: PorticoConfig,
    /// Resolved deployment mode.
    pub deployment: Deployment,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Route table from config, or the built-in one.
    pub fn router(&self) -> Result<ServiceRouter> {
        Ok(ServiceRouter::from_config(&self.config)?)
    }

    /// Credential store for this installation.
    pub fn credentials(&self) -> Result<SharedCredentialStore> {
        let data_dir = portico_config::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(create_file_store(&data_dir))
    }

    /// Gateway clients in the server render context; the CLI runs outside a
    /// browser.
    pub fn clients(&self) -> Result<GatewayClients> {
        Ok(GatewayClients::new(
            &self.router()?,
            Arc::new(Environment::server(self.deployment)),
            self.credentials()?,
            &self.config.client(),
        )?)
    }
}
