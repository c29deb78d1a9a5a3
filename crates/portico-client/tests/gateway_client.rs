//! Gateway client behavior against a mock backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use portico_auth::{CredentialStore, MemoryCredentialStore, SharedCredentialStore, TokenKind};
use portico_client::{
    EnvironmentSource, Error, GatewayClient, GatewayClients, Method, ServiceRoute, ServiceRouter,
};
use portico_config::{ClientConfig, Deployment, Environment, RenderContext};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV: Environment = Environment {
    context: RenderContext::Server,
    deployment: Deployment::Ci,
};

fn route_to(service: &str, server: &MockServer) -> ServiceRoute {
    ServiceRoute::new(service).with_base_url(RenderContext::Server, Deployment::Ci, server.uri())
}

fn client_with(server: &MockServer, store: SharedCredentialStore) -> GatewayClient {
    GatewayClient::builder(route_to("models", server))
        .environment(ENV)
        .credentials(store)
        .build()
        .unwrap()
}

fn store_with(access: Option<&str>, refresh: Option<&str>) -> SharedCredentialStore {
    Arc::new(MemoryCredentialStore::with_tokens(access, refresh))
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models/v1/models"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, store_with(Some("abc"), None));
    let body: Value = client.get("/models").await.unwrap();
    assert_eq!(body, json!({ "items": [] }));
}

#[tokio::test]
async fn test_no_token_sends_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_with(&server, store_with(None, None));
    let _: Value = client.get("models").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_401_clears_access_token_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models/v1/models"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"detail":"expired"}"#))
        .mount(&server)
        .await;

    let store = store_with(Some("stale"), Some("keep-me"));
    let client = client_with(&server, Arc::clone(&store));

    let err = client.get::<Value>("models").await.unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(err.body(), Some(r#"{"detail":"expired"}"#));

    assert!(store.get(TokenKind::Access).is_none());
    assert_eq!(store.get(TokenKind::Refresh).as_deref(), Some("keep-me"));

    // The next call goes out without the stale token.
    let _ = client.get::<Value>("models").await;
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_non_2xx_is_typed_error_and_keeps_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/models/v1/models/7"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .mount(&server)
        .await;

    let store = store_with(Some("abc"), None);
    let client = client_with(&server, Arc::clone(&store));

    let err = client.delete("models/7").await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, ref body } if body == "no such model"));
    assert_eq!(store.get(TokenKind::Access).as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_array_query_params_repeat() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_with(&server, store_with(None, None));
    let _: Value = client
        .get_with_query("models", &json!({ "category": [3, 4, 5], "q": null, "page": 2 }))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let pairs: Vec<(String, String)> = requests[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("category".to_string(), "3".to_string()),
            ("category".to_string(), "4".to_string()),
            ("category".to_string(), "5".to_string()),
            ("page".to_string(), "2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_json_bodies_and_empty_responses() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/models/v1/models/1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "name": "m1" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/models/v1/models/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    let client = client_with(&server, store_with(None, None));
    let () = client.put("models/1", &json!({ "name": "m1" })).await.unwrap();
    let patched: Value = client.patch("models/1", &json!({ "x": 1 })).await.unwrap();
    assert_eq!(patched["id"], 1);
}

#[tokio::test]
async fn test_send_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/models/v1/upload"))
        .respond_with(ResponseTemplate::new(201).set_body_string("stored"))
        .mount(&server)
        .await;

    let client = client_with(&server, store_with(None, None));
    let response = client
        .send(Method::POST, "upload", Some(b"raw,csv,bytes".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.text().await.unwrap(), "stored");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"raw,csv,bytes");
}

#[derive(Debug, Default)]
struct Switchable {
    production: AtomicBool,
}

impl EnvironmentSource for Switchable {
    fn current(&self) -> Environment {
        if self.production.load(Ordering::SeqCst) {
            Environment::server(Deployment::Production)
        } else {
            Environment::server(Deployment::Development)
        }
    }
}

#[tokio::test]
async fn test_base_url_resolved_per_call() {
    let dev = MockServer::start().await;
    let prod = MockServer::start().await;
    for server in [&dev, &prod] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(server)
            .await;
    }

    let route = ServiceRoute::new("models")
        .with_base_url(RenderContext::Server, Deployment::Development, dev.uri())
        .with_base_url(RenderContext::Server, Deployment::Production, prod.uri());
    let source = Arc::new(Switchable::default());
    let client = GatewayClient::builder(route)
        .environment_source(source.clone())
        .build()
        .unwrap();

    let _: Value = client.get("models").await.unwrap();
    source.production.store(true, Ordering::SeqCst);
    let _: Value = client.get("models").await.unwrap();

    assert_eq!(dev.received_requests().await.unwrap().len(), 1);
    assert_eq!(prod.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transport_failure_surfaces_http_error() {
    let route = ServiceRoute::new("models").with_base_url(
        RenderContext::Server,
        Deployment::Ci,
        "http://127.0.0.1:1",
    );
    let store = store_with(Some("abc"), None);
    let client = GatewayClient::builder(route)
        .environment(ENV)
        .credentials(Arc::clone(&store))
        .build()
        .unwrap();

    let err = client.get::<Value>("models").await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err:?}");
    assert_eq!(store.get(TokenKind::Access).as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_login_refresh_logout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/v1/token"))
        .and(body_json(json!({ "username": "admin", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/v1/token/refresh"))
        .and(body_json(json!({ "refresh_token": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "a2" })))
        .mount(&server)
        .await;

    let store: SharedCredentialStore = Arc::new(MemoryCredentialStore::new());
    let router = ServiceRouter::new(vec![route_to("auth", &server)]).unwrap();
    let clients = GatewayClients::new(
        &router,
        Arc::new(ENV),
        Arc::clone(&store),
        &ClientConfig::default(),
    )
    .unwrap();
    let auth = clients.auth().unwrap();

    let tokens = auth.login("admin", "pw").await.unwrap();
    assert_eq!(tokens.access_token, "a1");
    assert_eq!(store.get(TokenKind::Access).as_deref(), Some("a1"));
    assert_eq!(store.get(TokenKind::Refresh).as_deref(), Some("r1"));

    auth.refresh().await.unwrap();
    assert_eq!(store.get(TokenKind::Access).as_deref(), Some("a2"));
    // Not rotated by the backend.
    assert_eq!(store.get(TokenKind::Refresh).as_deref(), Some("r1"));

    auth.logout().unwrap();
    assert!(store.is_empty());
    assert!(matches!(auth.refresh().await, Err(Error::NoRefreshToken)));
}
