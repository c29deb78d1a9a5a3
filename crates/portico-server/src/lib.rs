//! HTTP edge for the Portico gateway.
//!
//! This crate provides the inbound side of the gateway: the edge guard that
//! gates every page request on the session cookie, and the same-origin
//! reverse proxy that forwards `/api/*` calls to the admin upstream.
//!
//! # Features
//!
//! - Cookie-based session gate with redirect to the login path
//! - Streaming reverse proxy with hop-by-hop and CORS header filtering
//! - Static application serving behind the guard
//! - Request logging
//!
//! # Example
//!
//! ```ignore
//! use portico_config::Deployment;
//! use portico_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new(Deployment::Production)
//!     .with_bind_address("0.0.0.0:8080".parse()?)
//!     .with_static_dir("./dist");
//!
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use guard::{EdgeGuard, GuardDecision, RequestCredentials, edge_guard_middleware};
pub use logging::{Outcome, RequestLog, request_logging_middleware};
pub use proxy::{PROXY_ERROR_TAG, ProxiedRequest, ReverseProxy, UpstreamTarget, proxy_handler};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, middleware, routing::any};
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Portico gateway server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self {
            state: AppState::new(config)?,
        })
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(routes::health_routes())
            .route("/api/{*path}", any(proxy::proxy_handler));

        // Unclaimed paths are the application itself.
        let router = match &self.state.config.static_dir {
            Some(dir) => router.fallback_service(
                ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
            ),
            None => router.fallback(routes::landing),
        };

        router
            // Edge guard (inner layer, wraps routes and fallback)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                guard::edge_guard_middleware,
            ))
            // Request logging (outer layer, sees redirects too)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            // TraceLayer for detailed HTTP tracing
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read local address: {}", e)))?;

        info!(
            addr = %local_addr,
            deployment = %self.state.config.deployment,
            upstream = %self.state.proxy.upstream(),
            "Starting gateway"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}
