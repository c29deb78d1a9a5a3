//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use portico_config::{Deployment, GuardConfig, PorticoConfig, ProxyConfig, defaults};

use crate::error::{Result, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Deployment mode; selects the reverse proxy upstream.
    pub deployment: Deployment,

    /// Where unauthenticated page requests are redirected.
    pub login_path: String,

    /// Directory served as the application behind the guard.
    /// `None` serves a plain landing page instead.
    pub static_dir: Option<PathBuf>,

    /// Enable request logging.
    pub request_logging: bool,

    /// Maximum proxied request body size in bytes.
    pub max_body_size: usize,

    /// Paths the edge guard lets through unconditionally.
    pub guard: GuardConfig,

    /// Reverse proxy upstreams.
    pub proxy: ProxyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], defaults::DEFAULT_PORT)),
            deployment: Deployment::default(),
            login_path: defaults::DEFAULT_LOGIN_PATH.to_string(),
            static_dir: None,
            request_logging: true,
            max_body_size: defaults::DEFAULT_MAX_BODY_SIZE,
            guard: GuardConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            ..Default::default()
        }
    }

    /// Build from the loaded configuration file.
    pub fn from_config(config: &PorticoConfig, deployment: Deployment) -> Result<Self> {
        let server = config.server();
        let bind = format!("{}:{}", server.bind, server.port);
        let bind_address = bind
            .parse()
            .map_err(|e| ServerError::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        Ok(Self {
            bind_address,
            deployment,
            login_path: server.login_path,
            static_dir: server.static_dir,
            request_logging: server.request_logging,
            max_body_size: server.max_body_size,
            guard: config.guard(),
            proxy: config.proxy(),
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the login path.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Serve a directory as the application.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the maximum proxied request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the guard exemptions.
    pub fn with_guard(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    /// Set the reverse proxy settings.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Upstream base host for the configured deployment.
    pub fn upstream(&self) -> &str {
        self.proxy.upstream_for(self.deployment)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy.timeout_secs)
    }
}
