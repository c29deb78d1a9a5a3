//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (DNS, connect, timeout). Surfaced unchanged.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-2xx status.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body (may be empty).
        body: String,
    },

    /// No route is registered under this logical name.
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential store failure.
    #[error("Credential error: {0}")]
    Credentials(#[from] portico_auth::AuthError),

    /// Renewal requested without a stored refresh token.
    #[error("No refresh token stored; log in again")]
    NoRefreshToken,
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Response body carried by this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// Check if the backend could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(e) if e.status().is_none())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
