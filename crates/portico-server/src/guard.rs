//! Edge guard.
//!
//! Every inbound request passes through [`edge_guard_middleware`] before any
//! handler runs. The decision itself lives in [`EdgeGuard::decide`], a pure
//! function of the path, the access-token cookie and the clock; the
//! middleware only extracts cookies and turns redirects into responses.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{COOKIE, LOCATION, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use portico_auth::{
    CookieCredentialStore, CredentialStore, SharedClock, TokenKind, inspect_jwt, system_clock,
};
use portico_config::GuardConfig;

use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of guarding one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Forward the request unchanged.
    Allow,
    /// No access-token cookie.
    RedirectUnauthenticated,
    /// Access-token cookie present but malformed or expired.
    RedirectInvalidToken,
}

impl GuardDecision {
    pub fn is_redirect(&self) -> bool {
        !matches!(self, GuardDecision::Allow)
    }
}

/// Guard configuration plus the clock used for expiry checks.
#[derive(Debug, Clone)]
pub struct EdgeGuard {
    exempt_exact: Vec<String>,
    exempt_prefixes: Vec<String>,
    login_path: String,
    clock: SharedClock,
}

impl EdgeGuard {
    /// Prefixes that are empty once trailing slashes are removed (`"/"`)
    /// would exempt every path and are ignored; `GuardConfig::validate`
    /// rejects them in configuration files.
    pub fn new(config: &GuardConfig, login_path: impl Into<String>) -> Self {
        Self {
            exempt_exact: config.exempt_exact.clone(),
            exempt_prefixes: config
                .exempt_prefixes
                .iter()
                .map(|p| p.trim_end_matches('/'))
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            login_path: login_path.into(),
            clock: system_clock(),
        }
    }

    /// Replace the clock (tests pin time with `FixedClock`).
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether `path` bypasses the guard.
    ///
    /// Exact entries match the whole path. A prefix `p` matches `p` itself and
    /// anything under `p/`, so `/api` covers `/api/x` but not `/apix`. The
    /// login path is always exempt so redirects cannot loop.
    pub fn is_exempt(&self, path: &str) -> bool {
        if path == self.login_path || self.exempt_exact.iter().any(|p| p == path) {
            return true;
        }
        self.exempt_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Decide against the guard's clock.
    pub fn decide(&self, path: &str, access_cookie: Option<&str>) -> GuardDecision {
        self.decide_at(path, access_cookie, self.clock.now_unix())
    }

    /// Decide against an explicit Unix time. Empty cookie values count as absent.
    pub fn decide_at(&self, path: &str, access_cookie: Option<&str>, now: i64) -> GuardDecision {
        if self.is_exempt(path) {
            return GuardDecision::Allow;
        }

        let Some(token) = access_cookie.filter(|t| !t.is_empty()) else {
            return GuardDecision::RedirectUnauthenticated;
        };

        match inspect_jwt(token, now) {
            Ok(_) => GuardDecision::Allow,
            Err(reason) => {
                tracing::debug!(path, %reason, "Rejecting access token");
                GuardDecision::RedirectInvalidToken
            }
        }
    }

    /// Decide from a credential store; an invalid token purges every credential.
    pub fn evaluate(&self, path: &str, store: &dyn CredentialStore) -> GuardDecision {
        let access = store.get(TokenKind::Access);
        let decision = self.decide(path, access.as_deref());

        if decision == GuardDecision::RedirectInvalidToken
            && let Err(e) = store.clear_all()
        {
            tracing::warn!(error = %e, "Failed to clear credentials after invalid token");
        }

        decision
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// The request's cookie jar, available to handlers as an extension.
///
/// Changes made through it (for example by a gateway client clearing a
/// token after a 401) are written back as `Set-Cookie` headers.
///
/// ```ignore
/// async fn sign_out(Extension(RequestCredentials(jar)): Extension<RequestCredentials>) -> Result<()> {
///     jar.clear_all()?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestCredentials(pub Arc<CookieCredentialStore>);

/// Edge guard middleware function.
///
/// The decision is left on the response as an extension for request logging.
pub async fn edge_guard_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = Arc::new(CookieCredentialStore::from_cookie_headers(
        request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    ));

    let path = request.uri().path().to_string();
    let decision = state.guard.evaluate(&path, &*jar);

    let mut response = if decision.is_redirect() {
        tracing::info!(path = %path, ?decision, "Redirecting to login");
        redirect(state.guard.login_path())
    } else {
        request
            .extensions_mut()
            .insert(RequestCredentials(Arc::clone(&jar)));
        next.run(request).await
    };
    response.extensions_mut().insert(decision);

    for cookie in jar.set_cookie_headers() {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unencodable Set-Cookie header"),
        }
    }

    response
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::SEE_OTHER, [(LOCATION, value)]).into_response(),
        Err(_) => {
            (StatusCode::SEE_OTHER, [(LOCATION, HeaderValue::from_static("/"))]).into_response()
        }
    }
}
