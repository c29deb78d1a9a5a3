//! HTTP clients for the backend services behind the Portico gateway.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use portico_client::{GatewayClients, ServiceRouter};
//! use portico_config::{ClientConfig, Deployment, Environment};
//!
//! # async fn example() -> portico_client::Result<()> {
//! let clients = GatewayClients::new(
//!     &ServiceRouter::with_defaults(),
//!     Arc::new(Environment::server(Deployment::Development)),
//!     portico_auth::create_memory_store(),
//!     &ClientConfig::default(),
//! )?;
//!
//! clients.auth()?.login("admin", "secret").await?;
//! let tools: serde_json::Value = clients
//!     .get("tools")?
//!     .get_with_query("/tools", &serde_json::json!({ "category": [3, 4] }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod query;
pub mod router;
pub mod types;

pub use api::AuthApi;
pub use client::{ClientBuilder, GatewayClient, GatewayClients};
pub use error::{Error, Result};
pub use query::{query_pairs, serialize_query};
pub use router::{EnvironmentSource, FixedEnvironment, ServiceRoute, ServiceRouter};
pub use types::{LoginRequest, RefreshRequest, TokenPair};

// Re-exported so callers can name methods for `GatewayClient::send`.
pub use reqwest::Method;
