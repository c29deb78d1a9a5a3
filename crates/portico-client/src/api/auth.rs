//! Auth service API.

use portico_auth::TokenKind;

use crate::client::GatewayClient;
use crate::error::{Error, Result};
use crate::types::{LoginRequest, RefreshRequest, TokenPair};

/// Login endpoint, relative to the auth service prefix.
pub const LOGIN_PATH: &str = "token";

/// Renewal endpoint, relative to the auth service prefix.
pub const REFRESH_PATH: &str = "token/refresh";

/// Session lifecycle over the `auth` service.
///
/// Tokens land in the client's credential store; nothing is cached here.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: GatewayClient,
}

impl AuthApi {
    pub(crate) fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    /// Exchange a username and password for a token pair and store both.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let tokens: TokenPair = self.client.post(LOGIN_PATH, &request).await?;

        let store = self.client.credentials();
        store.set(TokenKind::Access, &tokens.access_token)?;
        match &tokens.refresh_token {
            Some(refresh) => store.set(TokenKind::Refresh, refresh)?,
            None => store.clear(TokenKind::Refresh)?,
        }

        tracing::info!(service = %self.client.service(), "Logged in");
        Ok(tokens)
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// The refresh token is replaced only when the backend rotates it.
    pub async fn refresh(&self) -> Result<TokenPair> {
        let store = self.client.credentials();
        let refresh_token = store.get(TokenKind::Refresh).ok_or(Error::NoRefreshToken)?;

        let tokens: TokenPair = self
            .client
            .post(REFRESH_PATH, &RefreshRequest { refresh_token })
            .await?;

        store.set(TokenKind::Access, &tokens.access_token)?;
        if let Some(rotated) = &tokens.refresh_token {
            store.set(TokenKind::Refresh, rotated)?;
        }

        tracing::info!(
            service = %self.client.service(),
            rotated = tokens.refresh_token.is_some(),
            "Access token renewed"
        );
        Ok(tokens)
    }

    /// Forget both tokens.
    pub fn logout(&self) -> Result<()> {
        self.client.credentials().clear_all()?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.credentials().get(TokenKind::Access).is_some()
    }
}
