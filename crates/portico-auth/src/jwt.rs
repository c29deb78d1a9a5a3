//! Structural and liveness checks for JWT bearer tokens.
//!
//! # Limitation
//!
//! The signature segment is **never verified**. These checks only establish
//! that a token has JWT shape and an `exp` claim in the future, which makes
//! them a cheap pre-filter for the edge tier. Backend services remain the
//! authority on whether a token is genuine; a token passing here must not be
//! treated as an authentication decision.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::error::TokenError;

/// Claims extracted from an unverified token payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Expiry as Unix seconds.
    pub exp: i64,
    /// The full decoded payload.
    pub payload: Value,
}

impl Claims {
    /// Seconds until expiry relative to `now` (zero once expired).
    pub fn expires_in(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }

    /// The `sub` claim, if present.
    pub fn subject(&self) -> Option<&str> {
        self.payload.get("sub").and_then(Value::as_str)
    }
}

/// Check a token against the system clock.
///
/// Does not verify the signature; see the module docs.
pub fn is_valid_jwt(token: &str) -> bool {
    is_valid_jwt_at(token, SystemClock.now_unix())
}

/// Check a token against an explicit Unix time.
pub fn is_valid_jwt_at(token: &str, now: i64) -> bool {
    inspect_jwt(token, now).is_ok()
}

/// Decode a token and report why it fails, if it does.
///
/// Tokens with more than three segments are inspected on their second
/// segment like any other.
pub fn inspect_jwt(token: &str, now: i64) -> Result<Claims, TokenError> {
    let payload = decode_payload(token)?;

    let exp = payload
        .get("exp")
        .and_then(numeric_timestamp)
        .ok_or(TokenError::MissingExpiry)?;

    if exp <= now {
        return Err(TokenError::Expired { exp });
    }

    Ok(Claims { exp, payload })
}

/// Decode the payload segment without checking expiry.
pub fn decode_payload(token: &str) -> Result<Value, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature)) =
        (segments.next(), segments.next(), segments.next())
    else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Payload(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))
}

/// Integer or float seconds; anything else is unusable.
fn numeric_timestamp(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)
}
