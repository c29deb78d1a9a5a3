//! Execution environment: where the code runs and which deployment it serves.
//!
//! Both values are inputs to route resolution. They are detected once at
//! startup and never derived from request state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the deployment mode explicitly.
pub const DEPLOYMENT_ENV: &str = "PORTICO_DEPLOYMENT";

/// Environment variable set by most CI providers.
pub const CI_ENV: &str = "CI";

/// Deployment context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    /// Local development.
    #[default]
    #[serde(alias = "dev")]
    Development,
    /// Continuous integration / test environments.
    Ci,
    /// Production.
    #[serde(alias = "prod")]
    Production,
}

impl Deployment {
    /// All deployment modes, in a stable order.
    pub const ALL: [Deployment; 3] = [
        Deployment::Development,
        Deployment::Ci,
        Deployment::Production,
    ];

    /// Detect the deployment mode from process environment variables.
    ///
    /// `PORTICO_DEPLOYMENT` wins; otherwise a truthy `CI` selects [`Deployment::Ci`];
    /// otherwise development.
    pub fn detect() -> Result<Self, ConfigError> {
        Self::detect_from(|key| std::env::var(key).ok())
    }

    /// Detection against an arbitrary variable lookup.
    pub fn detect_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(DEPLOYMENT_ENV)
            && !value.trim().is_empty()
        {
            return value.parse();
        }

        let in_ci = lookup(CI_ENV).is_some_and(|v| {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        });

        Ok(if in_ci {
            Deployment::Ci
        } else {
            Deployment::Development
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Deployment::Development => "development",
            Deployment::Ci => "ci",
            Deployment::Production => "production",
        }
    }
}

impl FromStr for Deployment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Deployment::Development),
            "ci" | "test" => Ok(Deployment::Ci),
            "production" | "prod" => Ok(Deployment::Production),
            other => Err(ConfigError::UnknownDeployment(other.to_string())),
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering context of the code issuing a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderContext {
    /// Public, CORS-reachable side (browser or any out-of-cluster caller).
    Browser,
    /// Server process with access to internal network addresses.
    Server,
}

impl RenderContext {
    pub fn is_browser(&self) -> bool {
        matches!(self, RenderContext::Browser)
    }
}

impl fmt::Display for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderContext::Browser => f.write_str("browser"),
            RenderContext::Server => f.write_str("server"),
        }
    }
}

/// The complete input to route resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Environment {
    pub context: RenderContext,
    pub deployment: Deployment,
}

impl Environment {
    pub fn new(context: RenderContext, deployment: Deployment) -> Self {
        Self {
            context,
            deployment,
        }
    }

    pub fn browser(deployment: Deployment) -> Self {
        Self::new(RenderContext::Browser, deployment)
    }

    pub fn server(deployment: Deployment) -> Self {
        Self::new(RenderContext::Server, deployment)
    }

    pub fn is_browser(&self) -> bool {
        self.context.is_browser()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context, self.deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_detect_defaults_to_development() {
        let d = Deployment::detect_from(lookup(&[])).unwrap();
        assert_eq!(d, Deployment::Development);
    }

    #[test]
    fn test_detect_explicit_wins_over_ci() {
        let d =
            Deployment::detect_from(lookup(&[(DEPLOYMENT_ENV, "prod"), (CI_ENV, "true")])).unwrap();
        assert_eq!(d, Deployment::Production);
    }

    #[test]
    fn test_detect_ci_flag() {
        assert_eq!(
            Deployment::detect_from(lookup(&[(CI_ENV, "true")])).unwrap(),
            Deployment::Ci
        );
        assert_eq!(
            Deployment::detect_from(lookup(&[(CI_ENV, "1")])).unwrap(),
            Deployment::Ci
        );
        assert_eq!(
            Deployment::detect_from(lookup(&[(CI_ENV, "false")])).unwrap(),
            Deployment::Development
        );
        assert_eq!(
            Deployment::detect_from(lookup(&[(CI_ENV, "0")])).unwrap(),
            Deployment::Development
        );
    }

    #[test]
    fn test_detect_rejects_unknown() {
        let err = Deployment::detect_from(lookup(&[(DEPLOYMENT_ENV, "staging")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDeployment(ref s) if s == "staging"));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("DEV".parse::<Deployment>().unwrap(), Deployment::Development);
        assert_eq!("ci".parse::<Deployment>().unwrap(), Deployment::Ci);
        assert_eq!(
            " production ".parse::<Deployment>().unwrap(),
            Deployment::Production
        );
    }

    #[test]
    fn test_environment_display() {
        let env = Environment::server(Deployment::Production);
        assert_eq!(env.to_string(), "server/production");
        assert!(!env.is_browser());
        assert!(Environment::browser(Deployment::Ci).is_browser());
    }
}
