//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [gateway]                # deployment mode
//! [server]                 # bind address, login path, static app dir
//! [guard]                  # paths that bypass the edge guard
//! [proxy]                  # same-origin pass-through upstream
//! [client]                 # outbound client settings
//! [services.models]        # per-service route overrides
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::env::Deployment;
use crate::error::{ConfigError, Result};

/// Built-in defaults shared by the config types and the route table.
pub mod defaults {
    use crate::env::Deployment;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_BIND: &str = "127.0.0.1";
    pub const DEFAULT_LOGIN_PATH: &str = "/";
    pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_API_PREFIX: &str = "api";

    /// Placeholder replaced with the logical service name in base URLs.
    pub const SERVICE_PLACEHOLDER: &str = "{service}";

    /// Logical services routed when no `[services]` table is configured.
    pub const DEFAULT_SERVICES: &[&str] = &["auth", "admin", "models", "tools"];

    pub const PROXY_CI_HOST: &str = "http://127.0.0.1:9000";
    pub const PROXY_INTERNAL_HOST: &str = "http://admin-api.portico.svc.cluster.local";

    pub const EXEMPT_EXACT: &[&str] = &["/", "/favicon.ico", "/health"];
    pub const EXEMPT_PREFIXES: &[&str] = &["/_next", "/api", "/static"];

    /// Public origin per deployment. Empty means same origin.
    pub fn browser_base(deployment: Deployment) -> &'static str {
        match deployment {
            Deployment::Development => "http://localhost:9000",
            Deployment::Ci => "http://127.0.0.1:9000",
            Deployment::Production => "",
        }
    }

    /// Internal address per deployment, reachable only from the server.
    pub fn server_base(deployment: Deployment) -> &'static str {
        match deployment {
            Deployment::Development => "http://gateway.dev.internal:9000",
            Deployment::Ci => "http://127.0.0.1:9000",
            Deployment::Production => "http://{service}.portico.svc.cluster.local",
        }
    }

    /// `/api/<service>/v1`
    pub fn path_prefix(service: &str) -> String {
        format!("/api/{}/v1", service)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PorticoConfig {
    pub gateway: Option<GatewayConfig>,
    pub server: Option<ServerConfig>,
    pub guard: Option<GuardConfig>,
    pub proxy: Option<ProxyConfig>,
    pub client: Option<ClientConfig>,
    /// Logical services keyed by name.
    pub services: BTreeMap<String, ServiceConfig>,
}

impl PorticoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: PorticoConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: PorticoConfig) {
        if other.gateway.is_some() {
            self.gateway = other.gateway;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.guard.is_some() {
            self.guard = other.guard;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.client.is_some() {
            self.client = other.client;
        }
        for (name, service) in other.services {
            self.services.insert(name, service);
        }
    }

    /// Reject values that would make the gateway unsafe to run.
    pub fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy
            && proxy.timeout_secs == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "proxy.timeout_secs".to_string(),
                reason: "upstream calls need a finite, non-zero timeout".to_string(),
            });
        }
        if let Some(client) = &self.client
            && client.timeout_secs == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "client.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(server) = &self.server
            && !server.login_path.starts_with('/')
        {
            return Err(ConfigError::InvalidValue {
                field: "server.login_path".to_string(),
                reason: "must be an absolute path".to_string(),
            });
        }
        if let Some(guard) = &self.guard {
            guard.validate()?;
        }
        for (name, service) in &self.services {
            if name.is_empty() || name.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field: format!("services.{}", name),
                    reason: "service names must be non-empty and contain no '/'".to_string(),
                });
            }
            if let Some(prefix) = &service.path_prefix
                && !prefix.is_empty()
                && !prefix.starts_with('/')
            {
                return Err(ConfigError::InvalidValue {
                    field: format!("services.{}.path_prefix", name),
                    reason: "must start with '/'".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deployment mode from the config file, if set.
    pub fn deployment(&self) -> Option<Deployment> {
        self.gateway.as_ref().and_then(|g| g.deployment)
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn guard(&self) -> GuardConfig {
        self.guard.clone().unwrap_or_default()
    }

    pub fn proxy(&self) -> ProxyConfig {
        self.proxy.clone().unwrap_or_default()
    }

    pub fn client(&self) -> ClientConfig {
        self.client.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[gateway]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub deployment: Option<Deployment>,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    /// Public login boundary that unauthenticated requests are sent to.
    pub login_path: String,
    /// Directory served as the application behind the guard.
    pub static_dir: Option<PathBuf>,
    pub request_logging: bool,
    /// Maximum proxied request body in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::DEFAULT_PORT,
            bind: defaults::DEFAULT_BIND.to_string(),
            login_path: defaults::DEFAULT_LOGIN_PATH.to_string(),
            static_dir: None,
            request_logging: true,
            max_body_size: defaults::DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// `[guard]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Paths matched exactly.
    pub exempt_exact: Vec<String>,
    /// Path prefixes, matched on segment boundaries.
    pub exempt_prefixes: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            exempt_exact: defaults::EXEMPT_EXACT.iter().map(|s| s.to_string()).collect(),
            exempt_prefixes: defaults::EXEMPT_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GuardConfig {
    /// Exempt prefixes must name a path below the root. `"/"` (or `""`)
    /// would exempt every request.
    pub fn validate(&self) -> Result<()> {
        for prefix in &self.exempt_prefixes {
            if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "guard.exempt_prefixes".to_string(),
                    reason: format!("'{}' must be an absolute path below '/'", prefix),
                });
            }
        }
        Ok(())
    }
}

/// `[proxy]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream used in CI/test deployments.
    pub ci_host: String,
    /// Upstream used everywhere else.
    pub internal_host: String,
    /// Path segment inserted between the upstream host and the captured path.
    pub api_prefix: String,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            ci_host: defaults::PROXY_CI_HOST.to_string(),
            internal_host: defaults::PROXY_INTERNAL_HOST.to_string(),
            api_prefix: defaults::DEFAULT_API_PREFIX.to_string(),
            timeout_secs: defaults::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProxyConfig {
    /// Upstream base host for a deployment.
    pub fn upstream_for(&self, deployment: Deployment) -> &str {
        match deployment {
            Deployment::Ci => &self.ci_host,
            Deployment::Development | Deployment::Production => &self.internal_host,
        }
    }
}

/// `[client]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    /// Origin joined with same-origin (empty) resolutions.
    pub origin: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::DEFAULT_TIMEOUT_SECS,
            origin: None,
        }
    }
}

/// `[services.<name>]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Defaults to `/api/<name>/v1`.
    pub path_prefix: Option<String>,
    pub browser: DeploymentUrls,
    pub server: DeploymentUrls,
}

/// Base URL per deployment. Unset entries fall back to the built-in table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentUrls {
    pub development: Option<String>,
    pub ci: Option<String>,
    pub production: Option<String>,
}

impl DeploymentUrls {
    pub fn get(&self, deployment: Deployment) -> Option<&str> {
        match deployment {
            Deployment::Development => self.development.as_deref(),
            Deployment::Ci => self.ci.as_deref(),
            Deployment::Production => self.production.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parses() {
        let config = PorticoConfig::from_toml("").unwrap();
        assert!(config.gateway.is_none());
        assert!(config.services.is_empty());
        assert_eq!(config.server().port, defaults::DEFAULT_PORT);
        assert_eq!(config.server().login_path, "/");
    }

    #[test]
    fn test_full_config_parses() {
        let config = PorticoConfig::from_toml(
            r#"
[gateway]
deployment = "prod"

[server]
port = 3000
login_path = "/login"

[guard]
exempt_exact = ["/login"]
exempt_prefixes = ["/assets"]

[proxy]
ci_host = "http://ci-admin:9000"
internal_host = "http://admin.internal"
timeout_secs = 5

[services.models]
path_prefix = "/api/models/v2"
server.production = "http://models.internal"
browser.development = "http://localhost:7000"
"#,
        )
        .unwrap();

        assert_eq!(config.deployment(), Some(Deployment::Production));
        assert_eq!(config.server().port, 3000);
        assert_eq!(config.guard().exempt_prefixes, vec!["/assets"]);
        assert_eq!(config.proxy().timeout_secs, 5);

        let models = &config.services["models"];
        assert_eq!(models.path_prefix.as_deref(), Some("/api/models/v2"));
        assert_eq!(
            models.server.get(Deployment::Production),
            Some("http://models.internal")
        );
        assert_eq!(models.server.get(Deployment::Ci), None);
        assert_eq!(
            models.browser.get(Deployment::Development),
            Some("http://localhost:7000")
        );
    }

    #[test]
    fn test_zero_proxy_timeout_rejected() {
        let err = PorticoConfig::from_toml("[proxy]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "proxy.timeout_secs"));
    }

    #[test]
    fn test_relative_login_path_rejected() {
        let err = PorticoConfig::from_toml("[server]\nlogin_path = \"login\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_root_exempt_prefix_rejected() {
        for prefix in ["/", "//", "", "static"] {
            let toml = format!("[guard]\nexempt_prefixes = [\"/assets\", \"{}\"]\n", prefix);
            let err = PorticoConfig::from_toml(&toml).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "guard.exempt_prefixes"),
                "prefix {:?} accepted",
                prefix
            );
        }
        assert!(GuardConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_path_prefix_rejected() {
        let err =
            PorticoConfig::from_toml("[services.tools]\npath_prefix = \"api/tools\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_merge_overrides_sections_and_services() {
        let mut base = PorticoConfig::from_toml(
            r#"
[server]
port = 1000

[services.auth]
path_prefix = "/api/auth/v1"

[services.tools]
path_prefix = "/api/tools/v1"
"#,
        )
        .unwrap();
        let overlay = PorticoConfig::from_toml(
            r#"
[server]
port = 2000

[services.tools]
path_prefix = "/api/tools/v9"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.server().port, 2000);
        assert_eq!(base.services.len(), 2);
        assert_eq!(
            base.services["tools"].path_prefix.as_deref(),
            Some("/api/tools/v9")
        );
    }

    #[test]
    fn test_proxy_upstream_selection() {
        let proxy = ProxyConfig::default();
        assert_eq!(proxy.upstream_for(Deployment::Ci), defaults::PROXY_CI_HOST);
        assert_eq!(
            proxy.upstream_for(Deployment::Production),
            defaults::PROXY_INTERNAL_HOST
        );
        assert_eq!(
            proxy.upstream_for(Deployment::Development),
            defaults::PROXY_INTERNAL_HOST
        );
    }
}
