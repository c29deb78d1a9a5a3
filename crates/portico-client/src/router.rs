//! Logical service routing.
//!
//! A [`ServiceRouter`] is an immutable table of `(name, path prefix, base URL
//! resolver)` entries built once at startup. Resolution is a pure function of
//! the [`Environment`]: no network calls, no caching, no request state.

use std::fmt::Debug;

use portico_config::{
    Deployment, DeploymentUrls, Environment, PorticoConfig, RenderContext, ServiceConfig, defaults,
};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Environment source
// ─────────────────────────────────────────────────────────────────────────────

/// Supplies the environment at request dispatch time.
///
/// Clients ask for the environment on every call rather than capturing it at
/// construction, so a client built once can serve both render contexts.
pub trait EnvironmentSource: Send + Sync + Debug {
    fn current(&self) -> Environment;
}

impl EnvironmentSource for Environment {
    fn current(&self) -> Environment {
        *self
    }
}

/// An environment fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEnvironment(pub Environment);

impl EnvironmentSource for FixedEnvironment {
    fn current(&self) -> Environment {
        self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceRoute
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    name: String,
    path_prefix: String,
    browser: DeploymentUrls,
    server: DeploymentUrls,
}

impl ServiceRoute {
    /// Route with the default prefix (`/api/<name>/v1`) and default base URLs.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path_prefix: defaults::path_prefix(&name),
            name,
            browser: DeploymentUrls::default(),
            server: DeploymentUrls::default(),
        }
    }

    /// Route from a `[services.<name>]` section.
    pub fn from_config(name: &str, config: &ServiceConfig) -> Self {
        let mut route = Self::new(name);
        if let Some(prefix) = &config.path_prefix {
            route.path_prefix = prefix.clone();
        }
        route.browser = config.browser.clone();
        route.server = config.server.clone();
        route
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Override the base URL for one render context and deployment.
    pub fn with_base_url(
        mut self,
        context: RenderContext,
        deployment: Deployment,
        url: impl Into<String>,
    ) -> Self {
        let urls = match context {
            RenderContext::Browser => &mut self.browser,
            RenderContext::Server => &mut self.server,
        };
        let slot = match deployment {
            Deployment::Development => &mut urls.development,
            Deployment::Ci => &mut urls.ci,
            Deployment::Production => &mut urls.production,
        };
        *slot = Some(url.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Base URL without the path prefix.
    ///
    /// An empty string means "same origin": the caller should go through the
    /// gateway's reverse proxy instead of calling the backend directly.
    pub fn base_url(&self, env: Environment) -> String {
        let configured = match env.context {
            RenderContext::Browser => self.browser.get(env.deployment),
            RenderContext::Server => self.server.get(env.deployment),
        };
        let template = configured.unwrap_or_else(|| match env.context {
            RenderContext::Browser => defaults::browser_base(env.deployment),
            RenderContext::Server => defaults::server_base(env.deployment),
        });

        template
            .replace(defaults::SERVICE_PLACEHOLDER, &self.name)
            .trim_end_matches('/')
            .to_string()
    }

    /// Base URL with the path prefix appended.
    pub fn resolve(&self, env: Environment) -> String {
        format!("{}{}", self.base_url(env), self.path_prefix)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceRouter
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable table of logical services.
#[derive(Debug, Clone)]
pub struct ServiceRouter {
    routes: Vec<ServiceRoute>,
}

impl ServiceRouter {
    /// Build a table; logical names must be unique.
    pub fn new(routes: Vec<ServiceRoute>) -> Result<Self> {
        for (i, route) in routes.iter().enumerate() {
            if route.name.is_empty() {
                return Err(Error::Config("service name must not be empty".to_string()));
            }
            if routes[..i].iter().any(|r| r.name == route.name) {
                return Err(Error::Config(format!(
                    "service '{}' is defined more than once",
                    route.name
                )));
            }
        }
        Ok(Self { routes })
    }

    /// The built-in table (`auth`, `admin`, `models`, `tools`).
    pub fn with_defaults() -> Self {
        Self {
            routes: defaults::DEFAULT_SERVICES
                .iter()
                .map(|name| ServiceRoute::new(*name))
                .collect(),
        }
    }

    /// Table from `[services]`, or the built-in table when none are configured.
    pub fn from_config(config: &PorticoConfig) -> Result<Self> {
        if config.services.is_empty() {
            return Ok(Self::with_defaults());
        }
        Self::new(
            config
                .services
                .iter()
                .map(|(name, service)| ServiceRoute::from_config(name, service))
                .collect(),
        )
    }

    pub fn route(&self, service: &str) -> Option<&ServiceRoute> {
        self.routes.iter().find(|r| r.name == service)
    }

    /// Base URL plus path prefix for `service` in `env`.
    pub fn resolve(&self, service: &str, env: Environment) -> Result<String> {
        self.route(service)
            .map(|r| r.resolve(env))
            .ok_or_else(|| Error::UnknownService(service.to_string()))
    }

    pub fn routes(&self) -> impl Iterator<Item = &ServiceRoute> {
        self.routes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
