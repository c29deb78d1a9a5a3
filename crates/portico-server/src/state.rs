//! Application state shared across handlers.

use std::sync::Arc;

use portico_auth::SharedClock;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::guard::EdgeGuard;
use crate::proxy::ReverseProxy;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Edge guard applied to every request.
    pub guard: Arc<EdgeGuard>,

    /// Reverse proxy behind `/api/`.
    pub proxy: Arc<ReverseProxy>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config
            .guard
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let guard = EdgeGuard::new(&config.guard, config.login_path.clone());
        let proxy = ReverseProxy::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            guard: Arc::new(guard),
            proxy: Arc::new(proxy),
        })
    }

    /// Replace the guard's clock.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.guard = Arc::new((*self.guard).clone().with_clock(clock));
        self
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
