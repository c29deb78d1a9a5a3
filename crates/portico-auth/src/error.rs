//! Error types for credential storage and token inspection.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors raised by credential stores.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Backing storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A value cannot be represented by the store (e.g. not a valid cookie value).
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl From<std::io::Error> for AuthError {
    fn from(e: std::io::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Serialization(e.to_string())
    }
}

/// Reasons a bearer token fails the structural/liveness check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Fewer than three dot-separated segments.
    #[error("token is not a three-part JWT")]
    Malformed,

    /// Payload segment is not base64url-encoded JSON.
    #[error("token payload could not be decoded: {0}")]
    Payload(String),

    /// No numeric `exp` claim.
    #[error("token has no numeric exp claim")]
    MissingExpiry,

    /// `exp` is not in the future.
    #[error("token expired at {exp}")]
    Expired { exp: i64 },
}
