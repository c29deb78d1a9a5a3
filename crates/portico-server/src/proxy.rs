//! Same-origin reverse proxy.
//!
//! Everything under `/api/` that no other route claims is forwarded to a
//! single upstream admin host so browser code can reach it without CORS.
//!
//! The proxy performs no authentication of its own and never injects
//! credentials: whatever `Authorization` header the caller sent is forwarded
//! as-is, and a caller that sent none reaches the upstream unauthenticated.

use std::time::Duration;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::json;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Fixed `error` value of the 502 body.
pub const PROXY_ERROR_TAG: &str = "Proxy request failed";

/// Inbound path namespace handled by the proxy.
pub const PROXY_MOUNT: &str = "/api/";

/// Methods the proxy forwards.
pub const FORWARDED_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Request headers that are not forwarded. The body is buffered, so framing
/// is recomputed for the upstream hop.
const DROPPED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::HOST,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
];

/// Response headers that are not copied back, besides `Access-Control-*`.
const DROPPED_RESPONSE_HEADERS: [HeaderName; 2] = [header::CONNECTION, header::TRANSFER_ENCODING];

// ─────────────────────────────────────────────────────────────────────────────
// ProxiedRequest
// ─────────────────────────────────────────────────────────────────────────────

/// One inbound call, captured for forwarding.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    /// Captured trailing path, split on `/` and kept verbatim.
    pub path_segments: Vec<String>,
    /// Raw query string, without the `?`.
    pub query: Option<String>,
    /// Inbound headers minus the dropped set.
    pub headers: HeaderMap,
    /// `None` for GET and HEAD.
    pub body: Option<Bytes>,
}

impl ProxiedRequest {
    pub fn new(
        method: Method,
        path: &str,
        query: Option<&str>,
        inbound_headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let mut headers = inbound_headers.clone();
        for name in &DROPPED_REQUEST_HEADERS {
            headers.remove(name);
        }

        let body = match method {
            Method::GET | Method::HEAD => None,
            _ => body,
        };

        Self {
            method,
            path_segments: path.split('/').map(str::to_string).collect(),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
            headers,
            body,
        }
    }

    /// `<upstream>/<api_prefix>/<segments...>[?query]`
    pub fn upstream_url(&self, upstream: &str, api_prefix: &str) -> String {
        let mut parts = vec![upstream.trim_end_matches('/')];
        let prefix = api_prefix.trim_matches('/');
        if !prefix.is_empty() {
            parts.push(prefix);
        }
        parts.extend(self.path_segments.iter().map(String::as_str));

        let mut url = parts.join("/");
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReverseProxy
// ─────────────────────────────────────────────────────────────────────────────

/// Response extension naming the upstream a proxied call went to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// Upstream URL without the query string.
    pub url: String,
    /// `false` when the call failed before any upstream response.
    pub reached: bool,
}

/// Forwards [`ProxiedRequest`]s to one upstream host.
#[derive(Debug, Clone)]
pub struct ReverseProxy {
    http: reqwest::Client,
    upstream: String,
    api_prefix: String,
    timeout: Duration,
    max_body_size: usize,
}

impl ReverseProxy {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let timeout = config.proxy_timeout();
        if timeout.is_zero() {
            return Err(ServerError::Config(
                "proxy timeout must be greater than zero".to_string(),
            ));
        }

        // Upstream redirects are relayed, not followed.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ServerError::Config(format!("Failed to build proxy client: {}", e)))?;

        Ok(Self {
            http,
            upstream: config.upstream().to_string(),
            api_prefix: config.proxy.api_prefix.clone(),
            timeout,
            max_body_size: config.max_body_size,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Forward one request and translate the outcome into a response.
    ///
    /// Transport failures become `502 {"error", "details"}`; upstream error
    /// statuses are passed through like any other.
    pub async fn forward(&self, request: ProxiedRequest) -> Response {
        let url = request.upstream_url(&self.upstream, &self.api_prefix);
        tracing::debug!(method = %request.method, url = %url, "Forwarding to upstream");

        let mut outbound = self
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers)
            .timeout(self.timeout);
        if let Some(body) = request.body {
            outbound = outbound.body(body);
        }

        let (mut response, reached) = match outbound.send().await {
            Ok(upstream) => (relay(upstream), true),
            Err(e) => {
                tracing::warn!(
                    method = %request.method,
                    url = %url,
                    error = %e,
                    "Upstream request failed"
                );
                (bad_gateway(&e.to_string()), false)
            }
        };

        let without_query = url.split_once('?').map_or(url.as_str(), |(base, _)| base);
        response.extensions_mut().insert(UpstreamTarget {
            url: without_query.to_string(),
            reached,
        });
        response
    }
}

/// Copy status, filtered headers and a streamed body from the upstream.
fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();

    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    for (name, value) in upstream.headers() {
        if name.as_str().starts_with("access-control-")
            || DROPPED_RESPONSE_HEADERS.contains(name)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let stream = upstream
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn bad_gateway(details: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": PROXY_ERROR_TAG,
            "details": details,
        })),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Handle `/api/{*path}`.
///
/// The captured path is taken from the raw URI so percent-encoded segments
/// reach the upstream exactly as the caller sent them.
pub async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response> {
    let method = request.method().clone();
    if !FORWARDED_METHODS.contains(&method) {
        return Err(ServerError::MethodNotAllowed(method.to_string()));
    }

    let limit = state.proxy.max_body_size;
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ServerError::PayloadTooLarge { limit });
    }

    let raw_path = request.uri().path();
    let path = raw_path
        .strip_prefix(PROXY_MOUNT)
        .unwrap_or_else(|| raw_path.trim_start_matches('/'))
        .to_string();
    let query = request.uri().query().map(str::to_string);
    let headers = request.headers().clone();

    // Chunked bodies carry no Content-Length; the limit is enforced while reading.
    let body = Limited::new(request.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                ServerError::PayloadTooLarge { limit }
            } else {
                ServerError::BadRequest(format!("Failed to read request body: {}", e))
            }
        })?
        .to_bytes();

    let proxied = ProxiedRequest::new(method, &path, query.as_deref(), &headers, Some(body));
    Ok(state.proxy.forward(proxied).await)
}
