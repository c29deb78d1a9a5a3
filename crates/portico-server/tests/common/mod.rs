//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use portico_config::{Deployment, ProxyConfig};
use portico_server::{Server, ServerConfig};
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wiremock::MockServer;

/// A gateway running in the background in front of a mock upstream.
pub struct TestServer {
    /// The gateway's address.
    pub addr: SocketAddr,
    /// HTTP client that does not follow redirects.
    pub client: Client,
    /// Mock admin upstream behind the reverse proxy.
    pub upstream: MockServer,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a gateway whose CI upstream is a fresh mock server.
    pub async fn start() -> Result<Self> {
        let upstream = MockServer::start().await;
        let proxy = ProxyConfig {
            ci_host: upstream.uri(),
            ..ProxyConfig::default()
        };
        Self::start_with(upstream, proxy).await
    }

    /// Start a gateway with explicit proxy settings.
    pub async fn start_with(upstream: MockServer, proxy: ProxyConfig) -> Result<Self> {
        let addr = find_available_port().await?;

        let config = ServerConfig::new(Deployment::Ci)
            .with_bind_address(addr)
            .with_proxy(proxy);

        let server = Server::new(config)?;
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            upstream,
            _handle: handle,
        })
    }

    /// Get the base URL for the gateway.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

/// Unsigned token expiring `secs_from_now` seconds from now.
pub fn jwt_expiring_in(secs_from_now: i64) -> String {
    let exp = unix_now() + secs_from_now;
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"tester","exp":{}}}"#, exp))
    )
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
