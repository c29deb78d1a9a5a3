//! Per-service gateway client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use portico_auth::{SharedCredentialStore, TokenKind, create_memory_store};
use portico_config::ClientConfig;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::api::AuthApi;
use crate::error::{Error, Result};
use crate::query::query_pairs;
use crate::router::{EnvironmentSource, ServiceRoute, ServiceRouter};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one logical service.
///
/// The base URL is resolved from the [`EnvironmentSource`] on every call and
/// the bearer token is read from the credential store right before the
/// request leaves. A 401 answer clears the stored access token before the
/// error is returned; the refresh token is left alone.
///
/// # Example
///
/// ```no_run
/// use portico_client::{GatewayClient, ServiceRoute};
/// use portico_config::{Deployment, Environment};
///
/// # async fn example() -> portico_client::Result<()> {
/// let models = GatewayClient::builder(ServiceRoute::new("models"))
///     .environment(Environment::server(Deployment::Development))
///     .build()?;
///
/// let list: serde_json::Value = models.get("/models").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
    credentials: SharedCredentialStore,
}

/// Shared across clones and across `with_credentials` copies.
struct ClientInner {
    http: reqwest::Client,
    route: ServiceRoute,
    environment: Arc<dyn EnvironmentSource>,
    origin: Option<Url>,
    timeout: Duration,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("service", &self.inner.route.name())
            .field("environment", &self.inner.environment.current())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl GatewayClient {
    /// Create a new client builder for a route.
    pub fn builder(route: ServiceRoute) -> ClientBuilder {
        ClientBuilder::new(route)
    }

    /// Logical service name.
    pub fn service(&self) -> &str {
        self.inner.route.name()
    }

    pub fn credentials(&self) -> &SharedCredentialStore {
        &self.credentials
    }

    /// Copy of this client that reads and clears tokens in `store`.
    ///
    /// Server-side handlers use this with the inbound request's cookie jar so
    /// backend calls carry the caller's own bearer token.
    pub fn with_credentials(&self, store: SharedCredentialStore) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            credentials: store,
        }
    }

    /// Base URL (with path prefix) for the current environment.
    pub fn base_url(&self) -> Result<Url> {
        let resolved = self.inner.route.resolve(self.inner.environment.current());

        if resolved.starts_with('/') {
            let origin = self.inner.origin.as_ref().ok_or_else(|| {
                Error::Config(format!(
                    "service '{}' resolves to the same origin; set [client] origin",
                    self.service()
                ))
            })?;
            return Ok(origin.join(&resolved)?);
        }

        Ok(Url::parse(&resolved)?)
    }

    /// Build a URL for a path under the service prefix.
    pub fn url(&self, path: &str) -> Result<Url> {
        let base = self.base_url()?;
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Ok(base);
        }
        let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&joined)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute(Method::GET, path, None, None).await?;
        decode(response).await
    }

    /// Make a GET request with query parameters.
    ///
    /// `query` is flattened with [`serialize_query`](crate::serialize_query)
    /// semantics: arrays repeat the key, nulls are omitted.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let query = serde_json::to_value(query)?;
        let response = self.execute(Method::GET, path, Some(&query), None).await?;
        decode(response).await
    }

    /// Make a POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = json_body(body)?;
        let response = self.execute(Method::POST, path, None, Some(body)).await?;
        decode(response).await
    }

    /// Make a PUT request.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = json_body(body)?;
        let response = self.execute(Method::PUT, path, None, Some(body)).await?;
        decode(response).await
    }

    /// Make a PATCH request.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = json_body(body)?;
        let response = self.execute(Method::PATCH, path, None, Some(body)).await?;
        decode(response).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(Method::DELETE, path, None, None).await?;
        Ok(())
    }

    /// Send a raw request and hand back the successful response.
    ///
    /// The body is forwarded as-is with no content type.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let body = body.map(|bytes| RequestBody { bytes, json: false });
        self.execute(method, path, None, body).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&Value>,
        body: Option<RequestBody>,
    ) -> Result<reqwest::Response> {
        let mut url = self.url(path)?;
        if let Some(query) = query {
            let pairs = query_pairs(query);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }

        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .timeout(self.inner.timeout);

        if let Some(body) = body {
            if body.json {
                request = request.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            request = request.body(body.bytes);
        }

        // Read as late as possible so a token cleared by a concurrent 401 is
        // not reused.
        if let Some(token) = self.credentials.get(TokenKind::Access) {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => request = request.header(AUTHORIZATION, value),
                Err(_) => {
                    tracing::warn!(service = %self.service(), "Stored access token is not a valid header value, sending unauthenticated");
                }
            }
        }

        tracing::debug!(service = %self.service(), %method, url = %url, "Dispatching request");

        let response = request.send().await.map_err(|e| {
            tracing::debug!(service = %self.service(), error = %e, "Transport failure");
            Error::Http(e)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(service = %self.service(), "Backend answered 401, clearing access token");
            if let Err(e) = self.credentials.clear(TokenKind::Access) {
                tracing::warn!(service = %self.service(), error = %e, "Failed to clear access token");
            }
        }

        if !status.is_success() {
            return Err(extract_error(response).await);
        }

        Ok(response)
    }
}

struct RequestBody {
    bytes: Vec<u8>,
    json: bool,
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody> {
    Ok(RequestBody {
        bytes: serde_json::to_vec(body)?,
        json: true,
    })
}

/// Decode a JSON response; an empty body decodes as `null`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extract an error from a failed response.
async fn extract_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::Api { status, body }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a [`GatewayClient`].
pub struct ClientBuilder {
    route: ServiceRoute,
    environment: Option<Arc<dyn EnvironmentSource>>,
    credentials: Option<SharedCredentialStore>,
    origin: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new(route: ServiceRoute) -> Self {
        Self {
            route,
            environment: None,
            credentials: None,
            origin: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            http: None,
        }
    }

    /// Set where the environment is read from at dispatch time.
    pub fn environment(mut self, source: impl EnvironmentSource + 'static) -> Self {
        self.environment = Some(Arc::new(source));
        self
    }

    /// Set a shared environment source.
    pub fn environment_source(mut self, source: Arc<dyn EnvironmentSource>) -> Self {
        self.environment = Some(source);
        self
    }

    /// Set the credential store. Defaults to an empty in-memory store.
    pub fn credentials(mut self, store: SharedCredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Origin joined with same-origin resolutions (`/api/...`).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Reuse an existing connection pool.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GatewayClient> {
        let environment = self
            .environment
            .ok_or_else(|| Error::Config("environment is required".to_string()))?;

        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }

        let origin = self.origin.as_deref().map(Url::parse).transpose()?;

        let http = match self.http {
            Some(http) => http,
            None => build_http(self.user_agent)?,
        };

        Ok(GatewayClient {
            inner: Arc::new(ClientInner {
                http,
                route: self.route,
                environment,
                origin,
                timeout: self.timeout,
            }),
            credentials: self.credentials.unwrap_or_else(create_memory_store),
        })
    }
}

fn build_http(user_agent: Option<String>) -> Result<reqwest::Client> {
    let user_agent =
        user_agent.unwrap_or_else(|| format!("portico-client/{}", env!("CARGO_PKG_VERSION")));
    Ok(reqwest::Client::builder().user_agent(user_agent).build()?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Client table
// ─────────────────────────────────────────────────────────────────────────────

/// One [`GatewayClient`] per logical service, built once at startup.
///
/// All clients share a connection pool, an environment source and a
/// credential store.
#[derive(Debug, Clone)]
pub struct GatewayClients {
    clients: BTreeMap<String, GatewayClient>,
}

impl GatewayClients {
    pub fn new(
        router: &ServiceRouter,
        environment: Arc<dyn EnvironmentSource>,
        credentials: SharedCredentialStore,
        config: &ClientConfig,
    ) -> Result<Self> {
        let http = build_http(None)?;
        let mut clients = BTreeMap::new();

        for route in router.routes() {
            let mut builder = GatewayClient::builder(route.clone())
                .environment_source(Arc::clone(&environment))
                .credentials(Arc::clone(&credentials))
                .timeout(Duration::from_secs(config.timeout_secs))
                .http_client(http.clone());
            if let Some(origin) = &config.origin {
                builder = builder.origin(origin.clone());
            }
            clients.insert(route.name().to_string(), builder.build()?);
        }

        tracing::debug!(services = clients.len(), "Built gateway clients");
        Ok(Self { clients })
    }

    /// Client for a logical service.
    pub fn get(&self, service: &str) -> Result<&GatewayClient> {
        self.clients
            .get(service)
            .ok_or_else(|| Error::UnknownService(service.to_string()))
    }

    /// Auth API over the `auth` service.
    pub fn auth(&self) -> Result<AuthApi> {
        Ok(AuthApi::new(self.get("auth")?.clone()))
    }

    /// Copy of the whole table bound to another credential store.
    pub fn with_credentials(&self, store: SharedCredentialStore) -> Self {
        Self {
            clients: self
                .clients
                .iter()
                .map(|(name, client)| (name.clone(), client.with_credentials(Arc::clone(&store))))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}
