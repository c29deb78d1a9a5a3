//! Request logging middleware.
//!
//! One structured line per request, saying what the gateway did with it.
//! The guard and the reverse proxy leave markers on the response
//! ([`GuardDecision`], [`UpstreamTarget`]) that are read back here, so the
//! line can tell a login redirect from a relayed upstream answer.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::guard::GuardDecision;
use crate::proxy::UpstreamTarget;
use crate::state::AppState;

/// How a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Answered by the gateway itself.
    Served,
    /// Sent to the login path by the edge guard.
    Redirected(GuardDecision),
    /// Relayed from the upstream, whatever its status.
    Proxied,
    /// The upstream could not be reached.
    UpstreamFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Served => "served",
            Outcome::Redirected(GuardDecision::RedirectInvalidToken) => "redirect_invalid_token",
            Outcome::Redirected(_) => "redirect_unauthenticated",
            Outcome::Proxied => "proxied",
            Outcome::UpstreamFailed => "upstream_failed",
        }
    }
}

/// One request's log line.
#[derive(Debug, Clone)]
pub struct RequestLog {
    pub method: Method,
    /// Path only; query strings can carry identifiers.
    pub path: String,
    pub status: StatusCode,
    pub duration: Duration,
    pub outcome: Outcome,
    /// Upstream URL for proxied calls, without the query.
    pub upstream: Option<String>,
}

impl RequestLog {
    /// Summarize a finished request from the markers on its response.
    pub fn from_response(
        method: Method,
        path: String,
        response: &Response,
        duration: Duration,
    ) -> Self {
        let decision = response.extensions().get::<GuardDecision>().copied();
        let target = response.extensions().get::<UpstreamTarget>();

        let outcome = match (decision, target) {
            (Some(decision), _) if decision.is_redirect() => Outcome::Redirected(decision),
            (_, Some(target)) if target.reached => Outcome::Proxied,
            (_, Some(_)) => Outcome::UpstreamFailed,
            _ => Outcome::Served,
        };

        Self {
            method,
            path,
            status: response.status(),
            duration,
            outcome,
            upstream: target.map(|t| t.url.clone()),
        }
    }

    pub fn emit(&self) {
        let status = self.status.as_u16();
        let duration_ms = self.duration.as_millis() as u64;
        let outcome = self.outcome.as_str();
        let upstream = self.upstream.as_deref().unwrap_or("-");

        if self.outcome == Outcome::UpstreamFailed || self.status.is_server_error() {
            tracing::error!(
                method = %self.method, path = %self.path, status, duration_ms, outcome, upstream,
                "Request failed"
            );
        } else if self.status.is_client_error() {
            tracing::warn!(
                method = %self.method, path = %self.path, status, duration_ms, outcome, upstream,
                "Request rejected"
            );
        } else {
            tracing::info!(
                method = %self.method, path = %self.path, status, duration_ms, outcome, upstream,
                "Request completed"
            );
        }
    }
}

/// Emit a [`RequestLog`] for every request when request logging is on.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    RequestLog::from_response(method, path, &response, start.elapsed()).emit();
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        response
    }

    fn summarize(response: &Response) -> RequestLog {
        RequestLog::from_response(
            Method::GET,
            "/x".to_string(),
            response,
            Duration::from_millis(3),
        )
    }

    #[test]
    fn test_unmarked_response_is_served() {
        let log = summarize(&response(StatusCode::OK));
        assert_eq!(log.outcome, Outcome::Served);
        assert_eq!(log.upstream, None);
        assert_eq!(log.outcome.as_str(), "served");
    }

    #[test]
    fn test_guard_redirect_outcome() {
        let mut redirected = response(StatusCode::SEE_OTHER);
        redirected
            .extensions_mut()
            .insert(GuardDecision::RedirectInvalidToken);
        let log = summarize(&redirected);
        assert_eq!(
            log.outcome,
            Outcome::Redirected(GuardDecision::RedirectInvalidToken)
        );
        assert_eq!(log.outcome.as_str(), "redirect_invalid_token");

        let mut allowed = response(StatusCode::OK);
        allowed.extensions_mut().insert(GuardDecision::Allow);
        assert_eq!(summarize(&allowed).outcome, Outcome::Served);
    }

    #[test]
    fn test_proxied_outcomes() {
        let mut relayed = response(StatusCode::FORBIDDEN);
        relayed.extensions_mut().insert(GuardDecision::Allow);
        relayed.extensions_mut().insert(UpstreamTarget {
            url: "http://admin/api/roles".to_string(),
            reached: true,
        });
        let log = summarize(&relayed);
        assert_eq!(log.outcome, Outcome::Proxied);
        assert_eq!(log.upstream.as_deref(), Some("http://admin/api/roles"));

        let mut failed = response(StatusCode::BAD_GATEWAY);
        failed.extensions_mut().insert(UpstreamTarget {
            url: "http://admin/api/roles".to_string(),
            reached: false,
        });
        assert_eq!(summarize(&failed).outcome, Outcome::UpstreamFailed);
    }
}
