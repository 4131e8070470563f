//! Network operations against the identity endpoint.
//!
//! Two single-shot calls, no internal retry: `issue` exchanges a
//! username/password pair for an [`AuthResult`], `refresh` exchanges a
//! refresh token for a new one.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::debug;
use once_cell::sync::Lazy;
use reqwest::{header, StatusCode};

use crate::error::AuthError;
use crate::types::{AuthResponseBody, AuthResult};

/// Path of the token-issue endpoint, relative to the auth base URL.
pub const TOKEN_PATH: &str = "/token";
/// Path of the token-refresh endpoint, relative to the auth base URL.
pub const REFRESH_PATH: &str = "/token/refresh";
/// Header carrying the refresh token on refresh calls.
pub const REFRESH_TOKEN_HEADER: &str = "Refresh-Token";

/// Shared HTTP client - reuses connection pool and TLS session cache.
fn http_client() -> &'static reqwest::Client {
    static CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);
    &CLIENT
}

/// The two network operations of the auth flow. Implemented over HTTP in
/// production; test code substitutes stubs.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// Exchange user credentials for a token pair.
    /// Fails with `Unauthorized` on bad credentials, `Network` otherwise.
    async fn issue(&self, username: &str, password: &str) -> Result<AuthResult, AuthError>;

    /// Exchange a refresh token for a new token pair.
    /// Fails with `InvalidRefreshToken` on rejection, `Network` otherwise.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, AuthError>;
}

/// Basic-auth credential value: `Basic base64(username:password)`.
pub(crate) fn basic_credentials(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", username, password)))
}

/// HTTP implementation of [`AuthTransport`] against a px-style identity
/// endpoint (`POST {auth_base}/token`, `POST {auth_base}/token/refresh`).
pub struct HttpAuthTransport {
    client: reqwest::Client,
    auth_base: String,
}

impl HttpAuthTransport {
    /// Create a transport against `auth_base` using the shared client.
    /// Timeout semantics are whatever the client imposes; this layer adds
    /// none of its own.
    pub fn new(auth_base: impl Into<String>) -> Self {
        Self::with_client(http_client().clone(), auth_base)
    }

    /// Create a transport with a caller-supplied client.
    pub fn with_client(client: reqwest::Client, auth_base: impl Into<String>) -> Self {
        Self {
            client,
            auth_base: auth_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn parse_body(response: reqwest::Response) -> Result<AuthResult, AuthError> {
        let body: AuthResponseBody = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        body.into_result()
    }
}

#[async_trait]
impl AuthTransport for HttpAuthTransport {
    async fn issue(&self, username: &str, password: &str) -> Result<AuthResult, AuthError> {
        let url = format!("{}{}", self.auth_base, TOKEN_PATH);
        debug!("Issuing token for {} at {}", username, url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, basic_credentials(username, password))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "identity endpoint returned {}",
                status
            )));
        }
        Self::parse_body(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, AuthError> {
        let url = format!("{}{}", self.auth_base, REFRESH_PATH);
        debug!("Refreshing token at {}", url);

        let response = self
            .client
            .post(&url)
            .header(REFRESH_TOKEN_HEADER, refresh_token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidRefreshToken);
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "identity endpoint returned {}",
                status
            )));
        }
        Self::parse_body(response).await
    }
}
